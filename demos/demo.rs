use persister::prelude::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Model)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Model)]
pub struct Article {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub published: bool,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[belongs_to]
    pub author: Option<Author>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("🚀 Persister Demo\n");

    // Database setup
    let config = DatabaseConfig::new(
        "localhost".to_string(), // host
        5432,                    // port
        "persister".to_string(), // name
        "postgres".to_string(),  // username
        "password".to_string(),  // password
        1,                       // min_connections
        5,                       // max_connections
        30,                      // connection_timeout_seconds
        600,                     // idle_timeout_seconds
        3600,                    // max_lifetime_seconds
    );

    let database = Database::connect(&config).await?;
    database.health_check().await?;
    println!("✅ Database connected");

    for ddl in [
        "CREATE TABLE IF NOT EXISTS authors (id BIGSERIAL PRIMARY KEY, name TEXT NOT NULL, deleted_at TIMESTAMPTZ)",
        "CREATE TABLE IF NOT EXISTS articles (id BIGSERIAL PRIMARY KEY, author_id BIGINT NOT NULL, title TEXT NOT NULL, published BOOLEAN NOT NULL DEFAULT FALSE, deleted_at TIMESTAMPTZ)",
    ] {
        database.execute_sql(ddl).await?;
    }

    let authors = database.repository::<Author>();
    let articles = database.repository::<Article>();

    // Create inside a transaction
    let tx = database.transaction().await?;
    let mut author = Author {
        name: "Ada".to_string(),
        ..Default::default()
    };
    authors.part_of(tx.clone().connection()).create(&mut author).await?;

    let mut article = Article {
        author_id: author.id,
        title: "Notes on the Analytical Engine".to_string(),
        published: true,
        ..Default::default()
    };
    articles.part_of(tx.clone().connection()).create(&mut article).await?;
    tx.commit().await.map_err(|e| anyhow::anyhow!(e))?;
    println!("✅ Created author {} and article {}", author.id, article.id);

    // Eager load the author through a join
    let loaded = articles
        .with("author", vec![])
        .order_by(vec![Order::desc("id")])
        .get(vec![Condition::eq("published", true)])
        .await?;
    for article in &loaded {
        let by = article.author.as_ref().map(|a| a.name.as_str()).unwrap_or("?");
        println!("📄 {} by {}", article.title, by);
    }

    // Soft delete, then look past the marker
    articles.delete(&mut article, vec![]).await?;
    match articles.get(vec![Condition::eq("id", article.id)]).await {
        Err(e) if e.is_no_results() => println!("🗑️  Article hidden after delete"),
        other => println!("Unexpected: {:?}", other.map(|found| found.len())),
    }

    let hidden = articles
        .bypass_delete()
        .one(vec![Condition::eq("id", article.id)])
        .await?;
    println!("👀 Deleted at: {:?}", hidden.deleted_at);

    articles.restore(&mut article).await?;
    println!("♻️  Restored: {:?}", article.deleted_at);

    Ok(())
}
