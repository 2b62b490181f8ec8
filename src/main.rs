//! Template pipeline server

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use template_pipeline::{
    auth::{JwtValidator, SessionResolver},
    config::Args,
    db::MongoClient,
    logging::{init_tracing, AuditLogger},
    server::{self, AppState},
    store::Stores,
    Pipeline, Policy,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_tracing(&args.log_level, args.log_json);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Template Pipeline");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    if !args.memory_store {
        info!("MongoDB: {} (db {})", args.mongodb_uri, args.mongodb_db);
    }
    info!("======================================");

    let validator = match &args.jwt_secret {
        Some(secret) => JwtValidator::new(secret.clone(), args.jwt_expiry_seconds)?,
        None => {
            warn!("Using development JWT secret");
            JwtValidator::new_dev()
        }
    };
    let sessions = SessionResolver::new(validator, args.session_cookie.clone());

    let audit = AuditLogger::new();
    if let Some(path) = &args.audit_log_path {
        audit.init_file(path.clone()).await?;
    }

    let stores = if args.memory_store {
        info!("Using in-memory stores");
        Stores::memory()
    } else {
        match connect_mongo(&args).await {
            Ok(stores) => {
                info!("MongoDB connected successfully");
                stores
            }
            Err(e) => {
                if args.dev_mode {
                    warn!("MongoDB connection failed (dev mode, using in-memory stores): {}", e);
                    Stores::memory()
                } else {
                    error!("MongoDB connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    let policy = Policy {
        allow_self_promotion: args.allow_self_promotion,
    };
    let pipeline = Pipeline::new(stores, policy, audit);

    let state = Arc::new(AppState::new(args, pipeline, sessions));
    server::run(state).await?;

    info!("Template pipeline stopped");
    Ok(())
}

async fn connect_mongo(args: &Args) -> template_pipeline::Result<Stores> {
    let client = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
    Stores::mongo(&client).await
}
