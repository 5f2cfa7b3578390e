use chrono::{Days, Utc};
use serde_json::json;
use surveyhub_core::db::open_db_in_memory;
use surveyhub_core::{
    tables, AuditAction, AuditFilter, AuditPolicy, AuditRepository, FieldSpec, FieldType,
    RegionRepository, SqliteAuditRepository, SqliteRegionRepository, SqliteSurveyRepository,
    SurveyRepository, UserId,
};

const ADMIN: UserId = 1;

#[test]
fn standard_policy_skips_survey_and_region_mutations() {
    let mut conn = open_db_in_memory().unwrap();

    {
        let mut regions = SqliteRegionRepository::try_new(&mut conn).unwrap();
        regions.add_governorate(ADMIN, "Giza", None).unwrap();
    }
    {
        let mut surveys = SqliteSurveyRepository::try_new(&mut conn).unwrap();
        surveys
            .create_survey(
                ADMIN,
                "Rounds",
                &[FieldSpec {
                    field_type: FieldType::Text,
                    label: "Notes".to_string(),
                    options: Vec::new(),
                    required: false,
                }],
                &[],
            )
            .unwrap();
    }

    let audit = SqliteAuditRepository::try_new(&conn).unwrap();
    assert!(audit.query(&AuditFilter::default()).unwrap().is_empty());
}

#[test]
fn full_policy_records_every_routed_mutation() {
    let mut conn = open_db_in_memory().unwrap();

    {
        let mut regions =
            SqliteRegionRepository::with_policy(&mut conn, AuditPolicy::full()).unwrap();
        regions.add_governorate(ADMIN, "Giza", None).unwrap();
    }
    let survey_id = {
        let mut surveys =
            SqliteSurveyRepository::with_policy(&mut conn, AuditPolicy::full()).unwrap();
        let survey_id = surveys
            .create_survey(
                ADMIN,
                "Rounds",
                &[FieldSpec {
                    field_type: FieldType::Text,
                    label: "Notes".to_string(),
                    options: Vec::new(),
                    required: false,
                }],
                &[],
            )
            .unwrap();
        surveys.delete_survey(ADMIN, survey_id).unwrap();
        survey_id
    };

    let audit = SqliteAuditRepository::try_new(&conn).unwrap();
    let entries = audit.query(&AuditFilter::default()).unwrap();
    assert_eq!(entries.len(), 3);

    // Newest first: the delete leads.
    assert_eq!(entries[0].action, AuditAction::Delete);
    assert_eq!(entries[0].table_name, tables::SURVEYS);
    assert_eq!(entries[0].record_id, Some(survey_id));
    assert!(entries[0].old_value.as_deref().unwrap().contains("Rounds"));
    assert!(entries[0].new_value.is_none());

    let tables_seen: Vec<&str> = entries.iter().map(|e| e.table_name.as_str()).collect();
    assert!(tables_seen.contains(&tables::GOVERNORATES));
}

#[test]
fn filters_compose_conjunctively() {
    let conn = open_db_in_memory().unwrap();
    let audit = SqliteAuditRepository::try_new(&conn).unwrap();

    audit
        .append(
            ADMIN,
            AuditAction::Update,
            tables::USERS,
            Some(7),
            Some(&json!({ "username": "old-name" })),
            Some(&json!({ "username": "new-name" })),
        )
        .unwrap();
    audit
        .append(
            ADMIN,
            AuditAction::Insert,
            tables::SURVEYS,
            Some(9),
            None,
            Some(&json!({ "survey_name": "Rounds" })),
        )
        .unwrap();

    let by_table = audit
        .query(&AuditFilter {
            table: Some(tables::USERS.to_string()),
            ..AuditFilter::default()
        })
        .unwrap();
    assert_eq!(by_table.len(), 1);
    assert_eq!(by_table[0].record_id, Some(7));

    let by_action = audit
        .query(&AuditFilter {
            action: Some(AuditAction::Insert),
            ..AuditFilter::default()
        })
        .unwrap();
    assert_eq!(by_action.len(), 1);
    assert_eq!(by_action[0].table_name, tables::SURVEYS);

    let by_username = audit
        .query(&AuditFilter {
            username: Some("dmi".to_string()),
            ..AuditFilter::default()
        })
        .unwrap();
    assert_eq!(by_username.len(), 2, "substring matches the seeded admin");

    let by_search = audit
        .query(&AuditFilter {
            search: Some("Rounds".to_string()),
            ..AuditFilter::default()
        })
        .unwrap();
    assert_eq!(by_search.len(), 1);

    let nothing = audit
        .query(&AuditFilter {
            table: Some(tables::USERS.to_string()),
            action: Some(AuditAction::Insert),
            ..AuditFilter::default()
        })
        .unwrap();
    assert!(nothing.is_empty());
}

#[test]
fn date_range_bounds_are_inclusive() {
    let conn = open_db_in_memory().unwrap();
    let audit = SqliteAuditRepository::try_new(&conn).unwrap();
    audit
        .append(ADMIN, AuditAction::Update, tables::USERS, Some(1), None, None)
        .unwrap();

    // Timestamps are written with the storage engine's UTC clock.
    let today = Utc::now().date_naive();
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap();

    let hit = audit
        .query(&AuditFilter {
            from: Some(today),
            to: Some(today),
            ..AuditFilter::default()
        })
        .unwrap();
    assert_eq!(hit.len(), 1);

    let miss = audit
        .query(&AuditFilter {
            from: Some(tomorrow),
            ..AuditFilter::default()
        })
        .unwrap();
    assert!(miss.is_empty());

    let past_only = audit
        .query(&AuditFilter {
            to: Some(today.checked_sub_days(Days::new(1)).unwrap()),
            ..AuditFilter::default()
        })
        .unwrap();
    assert!(past_only.is_empty());
}
