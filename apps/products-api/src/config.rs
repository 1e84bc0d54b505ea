//! Configuration for Products API

use core_config::{app_info, env_parse, server::ServerConfig, AppInfo, FromEnv};
use database::mongodb::MongoConfig;
use domain_products::CloudinaryConfig;

pub use core_config::Environment;

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub mongodb: MongoConfig,
    pub server: ServerConfig,
    pub environment: Environment,
    pub cloudinary: CloudinaryConfig,
    /// Per-request timeout for image uploads (`UPLOAD_TIMEOUT_SECS`)
    pub upload_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let mongodb = MongoConfig::from_env()?;
        let server = ServerConfig::from_env()?;
        let cloudinary = CloudinaryConfig::from_env()?;
        let upload_timeout_secs = env_parse("UPLOAD_TIMEOUT_SECS", 30)?;

        Ok(Self {
            app: app_info!(),
            mongodb,
            server,
            environment,
            cloudinary,
            upload_timeout_secs,
        })
    }
}
