//! Destination key derivation
//!
//! Archive URLs end in `/{day}/{hour}/{filename}` where the filename embeds the
//! host as `{anything-without-dash}-{host}.gz`, for example
//! `/20240315/01/2024031501-www.example.com.gz`. Keys are rendered from a
//! template such as `/{prefix}/{host}/{day}/{filename}`.
//!
//! Derivation is a pure function of the URL: the same URL always yields the
//! same key, which is what makes HEAD-before-upload a sound idempotency check.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::{PipelineError, Result};

/// Default destination key template
pub const DEFAULT_KEY_TEMPLATE: &str = "/{prefix}/{host}/{day}/{filename}";

/// Default key prefix (normalized to `cdnlog/`)
pub const DEFAULT_PREFIX: &str = "cdnlog";

static ARCHIVE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"/(?P<day>[^/]+)/(?P<hour>[^/]+)/(?P<filename>[^-/]+-(?P<host>[^/]+)\.gz)$",
    )
    .expect("archive path pattern is valid")
});

/// Fields parsed from an archive URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogArchive {
    pub url: String,
    pub day: String,
    pub hour: String,
    pub filename: String,
    pub host: String,
}

impl LogArchive {
    /// Parse an archive URL, failing with `MalformedLogUrl` when the path does
    /// not follow the `/{day}/{hour}/{filename}` layout.
    pub fn parse(raw_url: &str) -> Result<Self> {
        let url = Url::parse(raw_url)
            .map_err(|e| PipelineError::malformed_log_url(raw_url, format!("invalid URL: {}", e)))?;

        let captures = ARCHIVE_PATH.captures(url.path()).ok_or_else(|| {
            PipelineError::malformed_log_url(
                raw_url,
                "path does not match /{day}/{hour}/{prefix}-{host}.gz",
            )
        })?;

        Ok(Self {
            url: raw_url.to_string(),
            day: captures["day"].to_string(),
            hour: captures["hour"].to_string(),
            filename: captures["filename"].to_string(),
            host: captures["host"].to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Prefix,
    Host,
    Day,
    Hour,
    Filename,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "prefix" => Some(Field::Prefix),
            "host" => Some(Field::Host),
            "day" => Some(Field::Day),
            "hour" => Some(Field::Hour),
            "filename" => Some(Field::Filename),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// Renders destination keys from archive URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDeriver {
    template: String,
    prefix: String,
    segments: Vec<Segment>,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_TEMPLATE, DEFAULT_PREFIX)
            .expect("default key template is valid")
    }
}

impl KeyDeriver {
    /// Compile a template. Fails with `ConfigInvalid` on unknown placeholders,
    /// unbalanced braces, or a template without `{filename}`.
    pub fn new(template: &str, prefix: &str) -> Result<Self> {
        let segments = compile_template(template)?;
        if !segments.contains(&Segment::Field(Field::Filename)) {
            return Err(PipelineError::config_invalid(format!(
                "key template '{}' must contain {{filename}}",
                template
            )));
        }

        Ok(Self {
            template: template.to_string(),
            prefix: normalize_prefix(prefix),
            segments,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Derive the destination key for an archive URL
    pub fn derive(&self, url: &str) -> Result<String> {
        let archive = LogArchive::parse(url)?;
        Ok(self.render(&archive))
    }

    /// Render the key for an already-parsed archive
    pub fn render(&self, archive: &LogArchive) -> String {
        let mut key = String::with_capacity(self.template.len() + archive.filename.len() * 2);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => key.push_str(text),
                Segment::Field(Field::Prefix) => key.push_str(&self.prefix),
                Segment::Field(Field::Host) => key.push_str(&archive.host),
                Segment::Field(Field::Day) => key.push_str(&archive.day),
                Segment::Field(Field::Hour) => key.push_str(&archive.hour),
                Segment::Field(Field::Filename) => key.push_str(&archive.filename),
            }
        }
        collapse_slashes(&key)
    }
}

/// Normalize a key prefix so that it is either empty or ends with `/`
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim();
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

fn compile_template(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(open) = rest.find(['{', '}']) {
        if rest[open..].starts_with('}') {
            return Err(PipelineError::config_invalid(format!(
                "key template '{}' has an unmatched '}}'",
                template
            )));
        }

        literal.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            PipelineError::config_invalid(format!(
                "key template '{}' has an unclosed '{{'",
                template
            ))
        })?;

        let name = &after[..close];
        let field = Field::parse(name).ok_or_else(|| {
            PipelineError::config_invalid(format!(
                "key template '{}' uses unknown placeholder {{{}}}; supported: prefix, host, day, hour, filename",
                template, name
            ))
        })?;

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Field(field));
        rest = &after[close + 1..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn collapse_slashes(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut previous_slash = false;
    for c in key.chars() {
        if c == '/' {
            if !previous_slash {
                out.push(c);
            }
            previous_slash = true;
        } else {
            out.push(c);
            previous_slash = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_default_key() {
        let deriver = KeyDeriver::default();
        let key = deriver
            .derive("https://cdn/log/20240315/01/01-a.example.gz")
            .unwrap();
        assert_eq!(key, "/cdnlog/a.example/20240315/01-a.example.gz");
    }

    #[test]
    fn derivation_ignores_query_string() {
        let deriver = KeyDeriver::default();
        let key = deriver
            .derive("https://log-download.example.com/20240315/01/2024031501-www.example.com.gz?t=1710&sign=abc")
            .unwrap();
        assert_eq!(
            key,
            "/cdnlog/www.example.com/20240315/2024031501-www.example.com.gz"
        );
    }

    #[test]
    fn host_may_contain_dashes() {
        let archive =
            LogArchive::parse("https://cdn/20240315/23/2024031523-my-site.example.gz").unwrap();
        assert_eq!(archive.host, "my-site.example");
        assert_eq!(archive.hour, "23");
        assert_eq!(archive.filename, "2024031523-my-site.example.gz");
    }

    #[test]
    fn malformed_paths_are_rejected() {
        let deriver = KeyDeriver::default();
        for url in [
            "https://cdn/weird/path.gz",
            "https://cdn/20240315/01/nodash.gz",
            "https://cdn/20240315/01/01-a.example.log",
            "https://cdn/01-a.example.gz",
            "not a url",
        ] {
            let err = deriver.derive(url).unwrap_err();
            assert_eq!(err.code(), crate::ErrorCode::E004MalformedLogUrl, "{}", url);
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let deriver = KeyDeriver::new("/{prefix}/{day}/{hour}/{host}/{filename}", "logs/cdn")
            .unwrap();
        let url = "https://cdn/20240315/07/2024031507-img.example.org.gz?sign=x";
        let first = deriver.derive(url).unwrap();
        for _ in 0..10 {
            assert_eq!(deriver.derive(url).unwrap(), first);
        }
        assert_eq!(
            first,
            "/logs/cdn/20240315/07/img.example.org/2024031507-img.example.org.gz"
        );
    }

    #[test]
    fn prefix_is_normalized() {
        assert_eq!(normalize_prefix("cdnlog"), "cdnlog/");
        assert_eq!(normalize_prefix("cdnlog/"), "cdnlog/");
        assert_eq!(normalize_prefix("  "), "");

        let deriver = KeyDeriver::new(DEFAULT_KEY_TEMPLATE, "").unwrap();
        assert_eq!(
            deriver
                .derive("https://cdn/20240315/01/01-a.example.gz")
                .unwrap(),
            "/a.example/20240315/01-a.example.gz"
        );
    }

    #[test]
    fn template_errors() {
        assert!(KeyDeriver::new("/{prefix}/{region}/{filename}", "x").is_err());
        assert!(KeyDeriver::new("/{prefix}/{host", "x").is_err());
        assert!(KeyDeriver::new("/{prefix}}/{filename}", "x").is_err());
        assert!(KeyDeriver::new("/{prefix}/{host}/{day}", "x").is_err());
        assert!(KeyDeriver::new("{filename}", "").is_ok());
    }
}
