//! Sends one notification to a device.
//!
//! ```text
//! GOOGLE_APPLICATION_CREDENTIALS=key.json \
//!     cargo run --example send_push -- <device-token> "Title" "Body" [--dry-run]
//! ```

use firebase_gateway::core::config::AppConfig;
use firebase_gateway::messaging::PushMessage;
use firebase_gateway::FirebaseApp;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let dry_run = args.iter().any(|a| a == "--dry-run");
    args.retain(|a| a != "--dry-run");

    let [token, title, body] = args.as_slice() else {
        return Err("usage: send_push <device-token> <title> <body> [--dry-run]".into());
    };

    let app = FirebaseApp::new(AppConfig::from_env()?)?;
    let message = PushMessage::new(token.as_str(), title.as_str(), body.as_str())
        .with_data("sent_by", "send_push");

    let push = app.messaging();
    let result = if dry_run {
        push.send_dry_run(&message).await
    } else {
        push.send(&message).await
    };

    match result {
        Ok(receipt) => {
            info!(message_id = ?receipt.message_id, dry_run, "done");
            Ok(())
        }
        Err(e) => {
            error!(stage = %e.stage(), "push failed: {}", e);
            Err(e.into())
        }
    }
}
