use super::*;
use anyhow::Result;
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_database() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
    Ok((temp_dir, database))
}

#[tokio::test]
async fn integration_schema_migration() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx%'",
    )
    .fetch_all(database.pool())
    .await?;

    let expected_tables: HashSet<&'static str> = ["vector_store"].into_iter().collect();
    let actual_tables: HashSet<&str> = tables.iter().map(|t| t.as_str()).collect();
    assert_eq!(actual_tables, expected_tables);

    Ok(())
}

#[tokio::test]
async fn migrations_are_idempotent() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    database.run_migrations().await?;
    database.run_migrations().await?;

    Ok(())
}

#[tokio::test]
async fn database_persists_across_reopen() -> Result<()> {
    let temp_dir = TempDir::new()?;

    {
        let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
        let row = NewStoredVector {
            id: "persisted".to_string(),
            document: "je suis".to_string(),
            embedding: 0.5f32.to_le_bytes().repeat(8),
            dimension: 8,
            metadata: "{}".to_string(),
        };
        database.upsert_vectors("lang_french_delf_dalf", &[row]).await?;
        database.pool().close().await;
    }

    let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
    assert_eq!(database.count_vectors("lang_french_delf_dalf").await?, 1);

    let stored = database
        .get_vector("lang_french_delf_dalf", "persisted")
        .await?
        .expect("row should survive reopening");
    assert_eq!(stored.stored_components(), 8);

    Ok(())
}

#[tokio::test]
async fn optimize_runs_on_populated_database() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let row = NewStoredVector {
        id: "a".to_string(),
        document: "doc".to_string(),
        embedding: 1.0f32.to_le_bytes().to_vec(),
        dimension: 1,
        metadata: "{}".to_string(),
    };
    database.upsert_vectors("lang_spanish_dele", &[row]).await?;
    database.optimize().await?;

    let summaries = database.summarize_collections().await?;
    assert_eq!(summaries.len(), 1);
    assert_eq!(database.list_collections().await?, vec!["lang_spanish_dele"]);

    Ok(())
}
