/// PGQUERY="select * from users" cargo run --example simple_query --features examples
use pgwire_query::{Connection, ConnectionConfig};

fn env(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = ConnectionConfig {
        host: env("PGHOST", "127.0.0.1"),
        port: env("PGPORT", "5432").parse()?,
        user: env("PGUSER", "postgres"),
        password: env("PGPASSWORD", "postgres"),
        database: env("PGDATABASE", "postgres"),
        ..ConnectionConfig::default()
    };
    let sql = env("PGQUERY", "select 1 as one");

    let conn = Connection::connect(cfg).await?;
    let info = conn.server_info();
    if let Some(version) = info.parameters.get("server_version") {
        println!("connected, server_version={version}");
    }

    let rs = conn.query(&sql).await?;
    let fields = rs.fields();
    let types = rs.types();
    println!(
        "{}",
        fields
            .iter()
            .zip(&types)
            .map(|(f, t)| format!("{f}::{t}"))
            .collect::<Vec<_>>()
            .join(" | ")
    );
    for row in rs.rows() {
        let line = row
            .iter()
            .map(|(_, v)| v.unwrap_or("NULL"))
            .collect::<Vec<_>>()
            .join(" | ");
        println!("{line}");
    }
    println!("{}", rs.status());

    conn.close().await?;
    Ok(())
}
