use rusqlite::Connection;
use surveyhub_core::db::open_db_in_memory;
use surveyhub_core::{
    FieldSpec, FieldType, RegionRepository, RepoError, ResponseRepository, Role,
    SqliteRegionRepository, SqliteResponseRepository, SqliteSurveyRepository,
    SqliteUserRepository, SubmissionError, SubmissionService, SurveyRepository, UserId,
    UserRepository,
};

const ADMIN: UserId = 1;

struct World {
    region: i64,
    nadia: UserId,
    survey: i64,
    name_field: i64,
    age_field: i64,
}

fn build_world(conn: &mut Connection) -> World {
    let region = {
        let mut regions = SqliteRegionRepository::try_new(conn).unwrap();
        let giza = regions.add_governorate(ADMIN, "Giza", None).unwrap();
        regions.add_health_admin(ADMIN, "Imbaba", None, giza).unwrap();
        regions.list_health_admins().unwrap()[0].admin_id
    };
    let nadia = {
        let mut users = SqliteUserRepository::try_new(conn).unwrap();
        users
            .add_user(ADMIN, "nadia", "hash", Role::Employee, Some(region))
            .unwrap()
    };
    let (survey, name_field, age_field) = {
        let mut surveys = SqliteSurveyRepository::try_new(conn).unwrap();
        let survey = surveys
            .create_survey(
                ADMIN,
                "Household Visit",
                &[
                    FieldSpec {
                        field_type: FieldType::Text,
                        label: "Name".to_string(),
                        options: Vec::new(),
                        required: true,
                    },
                    FieldSpec {
                        field_type: FieldType::Number,
                        label: "Age".to_string(),
                        options: Vec::new(),
                        required: false,
                    },
                ],
                &[],
            )
            .unwrap();
        let fields = surveys.survey_fields(survey).unwrap();
        (survey, fields[0].field_id, fields[1].field_id)
    };
    World {
        region,
        nadia,
        survey,
        name_field,
        age_field,
    }
}

#[test]
fn answers_roundtrip_and_absent_values_become_empty_strings() {
    let mut conn = open_db_in_memory().unwrap();
    let world = build_world(&mut conn);

    let mut repo = SqliteResponseRepository::try_new(&mut conn).unwrap();
    let response = repo
        .save_response(world.survey, world.nadia, world.region, false)
        .unwrap();

    repo.save_response_detail(response, world.name_field, Some("Alice"))
        .unwrap();
    repo.save_response_detail(response, world.age_field, None)
        .unwrap();

    let details = repo.response_details(response).unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0].field_label, "Name");
    assert_eq!(details[0].answer_value, "Alice");
    assert_eq!(details[1].answer_value, "", "absent input is stored as empty text");
}

#[test]
fn answers_must_belong_to_the_responses_survey() {
    let mut conn = open_db_in_memory().unwrap();
    let world = build_world(&mut conn);

    let other_field = {
        let mut surveys = SqliteSurveyRepository::try_new(&mut conn).unwrap();
        let other = surveys
            .create_survey(
                ADMIN,
                "Other",
                &[FieldSpec {
                    field_type: FieldType::Text,
                    label: "X".to_string(),
                    options: Vec::new(),
                    required: false,
                }],
                &[],
            )
            .unwrap();
        surveys.survey_fields(other).unwrap()[0].field_id
    };

    let mut repo = SqliteResponseRepository::try_new(&mut conn).unwrap();
    let response = repo
        .save_response(world.survey, world.nadia, world.region, false)
        .unwrap();

    let err = repo
        .save_response_detail(response, other_field, Some("sneaky"))
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
    assert!(repo.response_details(response).unwrap().is_empty());
}

#[test]
fn update_response_detail_amends_one_answer() {
    let mut conn = open_db_in_memory().unwrap();
    let world = build_world(&mut conn);

    let mut repo = SqliteResponseRepository::try_new(&mut conn).unwrap();
    let response = repo
        .save_response(world.survey, world.nadia, world.region, true)
        .unwrap();
    repo.save_response_detail(response, world.name_field, Some("Alice"))
        .unwrap();

    let detail_id = repo.response_details(response).unwrap()[0].detail_id;
    repo.update_response_detail(ADMIN, detail_id, "Alicia").unwrap();
    assert_eq!(repo.response_details(response).unwrap()[0].answer_value, "Alicia");

    let err = repo.update_response_detail(ADMIN, 4242, "x").unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "response detail", .. }));
}

#[test]
fn response_info_joins_the_region_hierarchy() {
    let mut conn = open_db_in_memory().unwrap();
    let world = build_world(&mut conn);

    let mut repo = SqliteResponseRepository::try_new(&mut conn).unwrap();
    let response = repo
        .save_response(world.survey, world.nadia, world.region, true)
        .unwrap();

    let info = repo.response_info(response).unwrap().unwrap();
    assert_eq!(info.survey_name, "Household Visit");
    assert_eq!(info.username, "nadia");
    assert_eq!(info.health_admin_name, "Imbaba");
    assert_eq!(info.governorate_name, "Giza");
    assert!(repo.response_info(4242).unwrap().is_none());
}

#[test]
fn completion_predicate_tracks_state_and_calendar_date() {
    let mut conn = open_db_in_memory().unwrap();
    let world = build_world(&mut conn);

    {
        let mut repo = SqliteResponseRepository::try_new(&mut conn).unwrap();
        assert!(!repo
            .has_completed_survey_today(world.nadia, world.survey)
            .unwrap());

        // Drafts never satisfy the predicate.
        repo.save_response(world.survey, world.nadia, world.region, false)
            .unwrap();
        assert!(!repo
            .has_completed_survey_today(world.nadia, world.survey)
            .unwrap());

        repo.save_response(world.survey, world.nadia, world.region, true)
            .unwrap();
        assert!(repo
            .has_completed_survey_today(world.nadia, world.survey)
            .unwrap());
    }

    // Shift the completion to yesterday; the predicate is day-scoped.
    conn.execute(
        "UPDATE Responses SET submission_date = DATETIME('now', '-1 day')
         WHERE is_completed = 1;",
        [],
    )
    .unwrap();
    let repo = SqliteResponseRepository::try_new(&mut conn).unwrap();
    assert!(!repo
        .has_completed_survey_today(world.nadia, world.survey)
        .unwrap());
}

#[test]
fn storage_engine_rejects_second_completion_same_day() {
    let mut conn = open_db_in_memory().unwrap();
    let world = build_world(&mut conn);

    let mut repo = SqliteResponseRepository::try_new(&mut conn).unwrap();
    repo.save_response(world.survey, world.nadia, world.region, true)
        .unwrap();

    let err = repo
        .save_response(world.survey, world.nadia, world.region, true)
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::CompletionConflict { user_id, survey_id }
            if user_id == world.nadia && survey_id == world.survey
    ));

    // Drafts are still welcome after a completion.
    repo.save_response(world.survey, world.nadia, world.region, false)
        .unwrap();
}

#[test]
fn submission_service_gates_completed_submissions() {
    let mut conn = open_db_in_memory().unwrap();
    let world = build_world(&mut conn);

    let mut service =
        SubmissionService::new(SqliteResponseRepository::try_new(&mut conn).unwrap());
    let response = service
        .submit(world.survey, world.nadia, world.region, true)
        .unwrap();
    service
        .record_answer(response, world.name_field, Some("Alice"))
        .unwrap();
    assert!(service.has_completed_today(world.nadia, world.survey).unwrap());

    let err = service
        .submit(world.survey, world.nadia, world.region, true)
        .unwrap_err();
    assert!(matches!(err, SubmissionError::CompletedToday { .. }));

    // Incomplete submissions bypass the gate.
    service
        .submit(world.survey, world.nadia, world.region, false)
        .unwrap();
}
