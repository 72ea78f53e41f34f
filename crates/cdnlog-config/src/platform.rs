// Platform detection based on environment variables
//
// Auto-detects runtime environment:
// - Serverless function (SCF): SCF_FUNCTIONNAME or TENCENTCLOUD_RUNENV present
// - Lambda-compatible runtime: AWS_LAMBDA_FUNCTION_NAME present
// - Local: neither present (default)

use crate::LogFormat;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    Local,
    Lambda,
    Scf,
}

impl Platform {
    /// Auto-detect the current platform based on environment variables
    pub fn detect() -> Self {
        Self::detect_with(|key| env::var(key).ok())
    }

    pub(crate) fn detect_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup("SCF_FUNCTIONNAME").is_some() || lookup("TENCENTCLOUD_RUNENV").is_some() {
            Platform::Scf
        } else if lookup("AWS_LAMBDA_FUNCTION_NAME").is_some() {
            Platform::Lambda
        } else {
            Platform::Local
        }
    }

    pub fn is_serverless(&self) -> bool {
        !matches!(self, Platform::Local)
    }

    /// Get platform-specific defaults
    pub fn defaults(&self) -> PlatformDefaults {
        match self {
            Platform::Local => PlatformDefaults {
                log_format: LogFormat::Text,
            },
            // Function logs are collected line by line; keep them machine readable
            Platform::Lambda | Platform::Scf => PlatformDefaults {
                log_format: LogFormat::Json,
            },
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Local => write!(f, "local"),
            Platform::Lambda => write!(f, "lambda"),
            Platform::Scf => write!(f, "scf"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlatformDefaults {
    pub log_format: LogFormat,
}
