use chrono::DateTime;
use gmail_processor::config::Config;
use gmail_processor::db::Database;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <search_query>", args[0]);
        eprintln!("Search query matches against Sender or Subject.");
        std::process::exit(1);
    }

    let query = args[1].to_lowercase();
    let database_url = Config::load().database_url;
    let db = Database::new(&database_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    let matches: Vec<_> = db
        .get_all_emails()
        .await?
        .into_iter()
        .filter(|r| {
            r.from_address.to_lowercase().contains(&query)
                || r.subject.to_lowercase().contains(&query)
        })
        .collect();

    if matches.is_empty() {
        println!("No messages found matching '{}'", args[1]);
        return Ok(());
    }

    for record in &matches {
        let received = DateTime::from_timestamp(record.received_at, 0)
            .map(|d| d.to_rfc2822())
            .unwrap_or_else(|| record.received_at.to_string());

        println!("ID: {}", record.message_id);
        println!("Thread: {}", record.thread_id);
        println!("From: {}", record.from_address);
        println!("Subject: {}", record.subject);
        println!("Received: {}", received);
        println!("Labels: {}", record.labels.join(", "));
        println!(
            "--------------------------------------------------------------------------------"
        );
        println!("{}", record.body);
        println!(
            "--------------------------------------------------------------------------------"
        );
    }
    println!("{} message(s) found", matches.len());

    Ok(())
}
