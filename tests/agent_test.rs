//! Integration tests for the SQL agent against a SQLite copy of the view.

mod common;

use common::*;
use nlq_server::agent::{AgentSettings, TRUNCATION_NOTE};
use nlq_server::error::AgentError;
use nlq_server::policy::{FALLBACK_MESSAGE, GREETING_MESSAGE, STRUCTURE_REFUSAL_MESSAGE};

#[tokio::test]
async fn test_fixed_replies_skip_model_and_database() {
    let accessor = accessor_for("/nonexistent/dir/erp.db");
    let model = ScriptedModel::new(Vec::<String>::new());
    let agent = build_agent(accessor.clone(), model.clone(), AgentSettings::default());

    assert_eq!(agent.answer("Hello there!").await.unwrap(), GREETING_MESSAGE);
    assert_eq!(
        agent.answer("What columns does the table have?").await.unwrap(),
        STRUCTURE_REFUSAL_MESSAGE
    );
    assert_eq!(
        agent.answer("What's the weather today?").await.unwrap(),
        FALLBACK_MESSAGE
    );

    assert_eq!(model.call_count(), 0);
    assert!(!accessor.is_initialized());
}

#[tokio::test]
async fn test_questions_outside_known_vocabulary_reach_the_model() {
    let db = create_test_database().await;
    for question in [
        "What did we buy from Maersk last month?",
        "most expensive thing we bought",
        "which column of spending is highest for vessel aurora",
        "show me all entries where the remarks column mentions delay",
    ] {
        let model = ScriptedModel::new(["Could you name the vessel or vendor?"]);
        let agent = build_agent(
            accessor_for(db.path().to_str().unwrap()),
            model.clone(),
            AgentSettings::default(),
        );

        let answer = agent.answer(question).await.unwrap();
        assert_eq!(answer, "Could you name the vessel or vendor?", "question: {}", question);
        assert_eq!(model.call_count(), 1, "question: {}", question);
    }
}

#[tokio::test]
async fn test_unanswerable_marker_gives_fallback() {
    let db = create_test_database().await;
    let model = ScriptedModel::new(["UNANSWERABLE"]);
    let agent = build_agent(
        accessor_for(db.path().to_str().unwrap()),
        model.clone(),
        AgentSettings::default(),
    );

    assert_eq!(
        agent.answer("How many moons does Jupiter have?").await.unwrap(),
        FALLBACK_MESSAGE
    );
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn test_answers_from_query_result() {
    let db = create_test_database().await;
    let model = ScriptedModel::new([
        sql_reply("SELECT Vendor, Vessel_Name FROM po_invoices WHERE port_name = 'Singapore'"),
        "Northwind Shipping supplied MV Borealis.".to_string(),
    ]);
    let agent = build_agent(
        accessor_for(db.path().to_str().unwrap()),
        model.clone(),
        AgentSettings::default(),
    );

    let answer = agent
        .answer("Which vendor delivered to the port of Singapore?")
        .await
        .unwrap();
    assert_eq!(answer, "Northwind Shipping supplied MV Borealis.");
    assert_eq!(model.call_count(), 2);

    let final_prompt = model.last_message(1);
    assert!(final_prompt.contains("| Vendor"), "{}", final_prompt);
    assert!(final_prompt.contains("Northwind Shipping"));
    assert!(final_prompt.contains("*1 row*"));
    assert!(!final_prompt.contains(TRUNCATION_NOTE));
}

#[tokio::test]
async fn test_text_comparison_ignores_case_and_punctuation() {
    let db = create_test_database().await;
    let model = ScriptedModel::new([
        sql_reply("SELECT Vessel_Name FROM po_invoices WHERE Vendor = 'ACME MARINE LTD'"),
        "Acme supplied two vessels.".to_string(),
    ]);
    let agent = build_agent(
        accessor_for(db.path().to_str().unwrap()),
        model.clone(),
        AgentSettings::default(),
    );

    agent
        .answer("Which vessels did vendor Acme Marine Ltd supply?")
        .await
        .unwrap();

    let final_prompt = model.last_message(1);
    assert!(final_prompt.contains("MV Aurora"), "{}", final_prompt);
    assert!(final_prompt.contains("MV Celeste"));
    assert!(final_prompt.contains("*2 rows*"));
}

#[tokio::test]
async fn test_empty_result_retried_with_approximate_match() {
    let db = create_test_database().await;
    let model = ScriptedModel::new([
        sql_reply("SELECT Vessel_Name FROM po_invoices WHERE Vendor = 'Northwnd Shipping'"),
        "MV Borealis.".to_string(),
    ]);
    let agent = build_agent(
        accessor_for(db.path().to_str().unwrap()),
        model.clone(),
        AgentSettings::default(),
    );

    let answer = agent
        .answer("Which vessel did vendor Northwnd Shipping supply?")
        .await
        .unwrap();
    assert_eq!(answer, "MV Borealis.");
    assert!(model.last_message(1).contains("MV Borealis"));
}

#[tokio::test]
async fn test_non_ascii_case_difference_found_by_approximate_match() {
    let db = create_test_database().await;
    let path = db.path().to_str().unwrap();
    insert_rows(path, &[("MÜLLER SCHIFF", 4, "MV Dolphin", 700.0, "Bremen")]).await;
    let model = ScriptedModel::new([
        sql_reply("SELECT Vessel_Name FROM po_invoices WHERE Vendor = 'Müller Schiff'"),
        "MV Dolphin.".to_string(),
    ]);
    let agent = build_agent(accessor_for(path), model.clone(), AgentSettings::default());

    let answer = agent
        .answer("Which vessel did vendor Müller Schiff supply?")
        .await
        .unwrap();
    assert_eq!(answer, "MV Dolphin.");
    assert!(model.last_message(1).contains("MV Dolphin"));
}

#[tokio::test]
async fn test_no_rows_returns_fallback_without_answer_call() {
    let db = create_test_database().await;
    let model = ScriptedModel::new([sql_reply(
        "SELECT Vessel_Name FROM po_invoices WHERE Vendor = 'Zzyzx Corporation'",
    )]);
    let agent = build_agent(
        accessor_for(db.path().to_str().unwrap()),
        model.clone(),
        AgentSettings::default(),
    );

    let answer = agent.answer("invoices from vendor Zzyzx Corporation").await.unwrap();
    assert_eq!(answer, FALLBACK_MESSAGE);
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn test_write_statement_is_rejected_and_corrected() {
    let db = create_test_database().await;
    let path = db.path().to_str().unwrap().to_string();
    let model = ScriptedModel::new([
        sql_reply("DELETE FROM po_invoices"),
        sql_reply("SELECT COUNT(*) AS invoices FROM po_invoices"),
        "There are four invoices.".to_string(),
    ]);
    let agent = build_agent(accessor_for(&path), model.clone(), AgentSettings::default());

    let answer = agent.answer("How many invoices are there?").await.unwrap();
    assert_eq!(answer, "There are four invoices.");
    assert_eq!(model.call_count(), 3);

    let observation = model.last_message(1);
    assert!(observation.contains("DELETE FROM po_invoices"), "{}", observation);
    assert!(observation.contains("failed"));
    assert_eq!(count_rows(&path).await, SAMPLE_ROWS.len() as i64);
}

#[tokio::test]
async fn test_foreign_relation_is_never_read() {
    let db = create_test_database().await;
    let model = ScriptedModel::new([
        sql_reply("SELECT name FROM sqlite_master"),
        "UNANSWERABLE".to_string(),
    ]);
    let agent = build_agent(
        accessor_for(db.path().to_str().unwrap()),
        model.clone(),
        AgentSettings::default(),
    );

    let answer = agent.answer("list every vendor table").await.unwrap();
    assert_eq!(answer, FALLBACK_MESSAGE);
    assert_eq!(model.call_count(), 2);
    assert!(model.last_message(1).contains("sqlite_master"));
}

#[tokio::test]
async fn test_sql_error_is_fed_back() {
    let db = create_test_database().await;
    let model = ScriptedModel::new([
        sql_reply("SELECT Supplier FROM po_invoices"),
        sql_reply("SELECT DISTINCT Vendor FROM po_invoices ORDER BY Vendor"),
        "Three vendors.".to_string(),
    ]);
    let agent = build_agent(
        accessor_for(db.path().to_str().unwrap()),
        model.clone(),
        AgentSettings::default(),
    );

    assert_eq!(
        agent.answer("list all vendors").await.unwrap(),
        "Three vendors."
    );
    assert!(model.last_message(1).contains("Database error"));
}

#[tokio::test]
async fn test_steps_exhausted_is_an_error() {
    let db = create_test_database().await;
    let model = ScriptedModel::new([
        sql_reply("DROP TABLE po_invoices"),
        sql_reply("UPDATE po_invoices SET Vendor = 'x'"),
        sql_reply("SELECT 1; SELECT 2"),
    ]);
    let agent = build_agent(
        accessor_for(db.path().to_str().unwrap()),
        model.clone(),
        AgentSettings::default(),
    );

    let err = agent.answer("show vendor invoices").await.unwrap_err();
    assert!(matches!(err, AgentError::Agent { .. }), "{:?}", err);
    assert_eq!(model.call_count(), 3);
}

#[tokio::test]
async fn test_model_failure_aborts() {
    let db = create_test_database().await;
    let model = ScriptedModel::new(Vec::<String>::new());
    let agent = build_agent(
        accessor_for(db.path().to_str().unwrap()),
        model,
        AgentSettings::default(),
    );

    let err = agent.answer("total invoice amount").await.unwrap_err();
    assert!(matches!(err, AgentError::Llm { .. }));
}

#[tokio::test]
async fn test_clarifying_question_is_returned_as_is() {
    let db = create_test_database().await;
    let model = ScriptedModel::new(["Which vessel do you mean?"]);
    let agent = build_agent(
        accessor_for(db.path().to_str().unwrap()),
        model,
        AgentSettings::default(),
    );

    assert_eq!(
        agent.answer("invoices for the vessel").await.unwrap(),
        "Which vessel do you mean?"
    );
}

#[tokio::test]
async fn test_explicit_limit_overrides_generated_limit() {
    let db = create_test_database().await;
    let model = ScriptedModel::new([
        sql_reply(
            "SELECT Vendor, INVOICE_AMOUNT FROM po_invoices ORDER BY INVOICE_AMOUNT DESC LIMIT 50",
        ),
        "Acme and Northwind.".to_string(),
    ]);
    let agent = build_agent(
        accessor_for(db.path().to_str().unwrap()),
        model.clone(),
        AgentSettings::default(),
    );

    agent.answer("show me the top 2 vendors").await.unwrap();

    let system = &model.calls()[0][0].content;
    assert!(system.contains("The user asked for 2 results"));
    let final_prompt = model.last_message(1);
    assert!(final_prompt.contains("*2 rows*"), "{}", final_prompt);
    assert!(!final_prompt.contains(TRUNCATION_NOTE));
}

#[tokio::test]
async fn test_default_cap_adds_truncation_note() {
    let db = create_test_database().await;
    let model = ScriptedModel::new([
        sql_reply("SELECT Vendor, Vessel_Name FROM po_invoices"),
        "Here are some invoices.".to_string(),
    ]);
    let settings = AgentSettings {
        default_row_limit: 2,
        ..AgentSettings::default()
    };
    let agent = build_agent(
        accessor_for(db.path().to_str().unwrap()),
        model.clone(),
        settings,
    );

    agent.answer("list vendor invoices").await.unwrap();

    let final_prompt = model.last_message(1);
    assert!(final_prompt.contains("*2 rows*"), "{}", final_prompt);
    assert!(final_prompt.contains(TRUNCATION_NOTE));
}
