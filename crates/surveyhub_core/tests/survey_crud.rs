use rusqlite::Connection;
use surveyhub_core::db::open_db_in_memory;
use surveyhub_core::{
    FieldPatch, FieldSpec, FieldType, RepoError, SqliteSurveyRepository, SurveyRepository, UserId,
};

const ADMIN: UserId = 1;

fn field(field_type: FieldType, label: &str) -> FieldSpec {
    FieldSpec {
        field_type,
        label: label.to_string(),
        options: Vec::new(),
        required: false,
    }
}

#[test]
fn create_survey_assigns_dense_one_based_field_order() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteSurveyRepository::try_new(&mut conn).unwrap();

    let fields = vec![
        field(FieldType::Text, "Name"),
        FieldSpec {
            field_type: FieldType::Select,
            label: "Vaccinated".to_string(),
            options: vec!["yes".to_string(), "no".to_string()],
            required: true,
        },
        field(FieldType::Number, "Age"),
    ];
    let survey_id = repo.create_survey(ADMIN, "Household Visit", &fields, &[]).unwrap();

    let stored = repo.survey_fields(survey_id).unwrap();
    assert_eq!(stored.len(), 3);
    for (index, field) in stored.iter().enumerate() {
        assert_eq!(field.order, index as u32 + 1);
    }
    assert_eq!(stored[0].label, "Name");
    assert_eq!(stored[1].label, "Vaccinated");
    assert_eq!(stored[1].options, vec!["yes".to_string(), "no".to_string()]);
    assert!(stored[1].required);
    assert_eq!(stored[2].field_type, FieldType::Number);

    let survey = repo.get_survey(survey_id).unwrap().unwrap();
    assert_eq!(survey.name, "Household Visit");
    assert_eq!(survey.created_by, ADMIN);
    assert!(survey.is_active);
}

#[test]
fn create_survey_rejects_empty_field_list() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteSurveyRepository::try_new(&mut conn).unwrap();

    let err = repo.create_survey(ADMIN, "Empty", &[], &[]).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
    assert!(repo.list_surveys().unwrap().is_empty());
}

#[test]
fn update_survey_is_additive_only() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteSurveyRepository::try_new(&mut conn).unwrap();

    let survey_id = repo
        .create_survey(
            ADMIN,
            "Clinic Audit",
            &[field(FieldType::Text, "Name"), field(FieldType::Number, "Beds")],
            &[],
        )
        .unwrap();
    let stored = repo.survey_fields(survey_id).unwrap();
    let beds_id = stored[1].field_id;

    // One in-place edit, one append; "Name" is omitted entirely.
    repo.update_survey(
        ADMIN,
        survey_id,
        "Clinic Audit v2",
        false,
        &[
            FieldPatch {
                field_id: Some(beds_id),
                field_type: FieldType::Number,
                label: "Bed Count".to_string(),
                options: Vec::new(),
                required: true,
            },
            FieldPatch {
                field_id: None,
                field_type: FieldType::Date,
                label: "Visit Date".to_string(),
                options: Vec::new(),
                required: false,
            },
        ],
    )
    .unwrap();

    let after = repo.survey_fields(survey_id).unwrap();
    assert_eq!(after.len(), 3, "omitted fields are never deleted");
    assert_eq!(after[0].label, "Name");
    assert_eq!(after[0].order, 1);
    assert_eq!(after[1].label, "Bed Count");
    assert!(after[1].required);
    assert_eq!(after[1].order, 2, "in-place edits keep their order");
    assert_eq!(after[2].label, "Visit Date");
    assert_eq!(after[2].order, 3, "appends take max(order) + 1");

    let survey = repo.get_survey(survey_id).unwrap().unwrap();
    assert_eq!(survey.name, "Clinic Audit v2");
    assert!(!survey.is_active);
}

#[test]
fn update_survey_rejects_unknown_survey_or_foreign_field() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteSurveyRepository::try_new(&mut conn).unwrap();

    let err = repo
        .update_survey(ADMIN, 4242, "Ghost", true, &[])
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "survey", .. }));

    let first = repo
        .create_survey(ADMIN, "First", &[field(FieldType::Text, "A")], &[])
        .unwrap();
    let second = repo
        .create_survey(ADMIN, "Second", &[field(FieldType::Text, "B")], &[])
        .unwrap();
    let foreign_field = repo.survey_fields(first).unwrap()[0].field_id;

    // A field id from another survey must not be editable through this one.
    let err = repo
        .update_survey(
            ADMIN,
            second,
            "Second",
            true,
            &[FieldPatch {
                field_id: Some(foreign_field),
                field_type: FieldType::Text,
                label: "Hijacked".to_string(),
                options: Vec::new(),
                required: false,
            }],
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "survey field", .. }));
    assert_eq!(repo.survey_fields(first).unwrap()[0].label, "A");
}

#[test]
fn delete_survey_cascades_without_orphans() {
    let mut conn = open_db_in_memory().unwrap();

    // Region + employee + linked survey + one answered response.
    conn.execute_batch(
        "INSERT INTO Governorates (governorate_name) VALUES ('Giza');
         INSERT INTO HealthAdministrations (admin_name, governorate_id) VALUES ('Imbaba', 1);
         INSERT INTO Users (username, password_hash, role, assigned_region)
             VALUES ('nadia', 'hash', 'employee', 1);",
    )
    .unwrap();

    let survey_id = {
        let mut repo = SqliteSurveyRepository::try_new(&mut conn).unwrap();
        repo.create_survey(ADMIN, "Doomed", &[field(FieldType::Text, "Name")], &[1])
            .unwrap()
    };
    conn.execute_batch(&format!(
        "INSERT INTO UserSurveys (user_id, survey_id) VALUES (2, {survey_id});
         INSERT INTO Responses (survey_id, user_id, region_id, is_completed)
             VALUES ({survey_id}, 2, 1, 1);
         INSERT INTO Response_Details (response_id, field_id, answer_value)
             VALUES (1, 1, 'Alice');"
    ))
    .unwrap();

    {
        let mut repo = SqliteSurveyRepository::try_new(&mut conn).unwrap();
        repo.delete_survey(ADMIN, survey_id).unwrap();
        assert!(repo.get_survey(survey_id).unwrap().is_none());

        let err = repo.delete_survey(ADMIN, survey_id).unwrap_err();
        assert!(matches!(err, RepoError::NotFound { entity: "survey", .. }));
    }

    for table in [
        "Survey_Fields",
        "Responses",
        "Response_Details",
        "UserSurveys",
        "SurveyGovernorate",
    ] {
        assert_eq!(count_rows(&conn, table), 0, "{table} kept orphan rows");
    }
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
