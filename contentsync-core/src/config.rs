//! Layered run configuration.
//!
//! # Sources, lowest precedence first
//!
//! 1. Optional YAML file (`--config <path>`). Never carries the credential.
//! 2. Environment variables (the action inputs listed in [`keys`]).
//! 3. CLI flags, applied by the binary with [`Settings::merge`].
//!
//! Every layer is a [`Settings`] with all-optional fields; [`Settings::resolve`]
//! validates the merged result into an immutable [`SyncRequest`].
//!
//! Environment access goes through a lookup closure so tests never touch the
//! process environment.

use std::path::{Component, Path};

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::{
    BotIdentity, ForgeTarget, MirrorBackend, RepoIdentity, RepoLocation, ReviewRequest,
    SyncRequest, DEFAULT_API_URL, DEFAULT_BASE_BRANCH, DEFAULT_BOT_USERNAME,
};

/// Environment variable names.
pub mod keys {
    pub const TOKEN: &str = "TOKEN";
    pub const BOT_USERNAME: &str = "BOT_USERNAME";
    pub const SOURCE_REPO: &str = "INPUT_SOURCE-REPO";
    pub const SOURCE_FOLDER: &str = "INPUT_SOURCE-FOLDER";
    pub const SOURCE_REF: &str = "INPUT_SOURCE-REF";
    pub const TRANSLATIONS_REPO: &str = "INPUT_TRANSLATIONS-REPO";
    pub const TRANSLATIONS_FOLDER: &str = "INPUT_TRANSLATIONS-FOLDER";
    pub const TRANSLATIONS_REF: &str = "INPUT_TRANSLATIONS-REF";
    pub const BASE_BRANCH: &str = "INPUT_BASE-BRANCH";
    pub const AUTO_MERGE: &str = "INPUT_AUTO-MERGE";
    pub const LOCAL_MODE: &str = "INPUT_LOCAL-MODE";
    pub const MIRROR: &str = "INPUT_MIRROR";
    pub const REMOTE_ROOT: &str = "INPUT_REMOTE-ROOT";
    pub const GPG_NAME: &str = "GPG_NAME";
    pub const GPG_EMAIL: &str = "GPG_EMAIL";
    pub const GPG_SIGNING_KEY: &str = "GPG_SIGNING_KEY";
    pub const API_URL: &str = "GITHUB_API_URL";
}

/// One configuration layer. `None` means "not set here".
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub bot_username: Option<String>,
    pub source_repo: Option<String>,
    pub source_folder: Option<String>,
    pub source_ref: Option<String>,
    pub translations_repo: Option<String>,
    pub translations_folder: Option<String>,
    pub translations_ref: Option<String>,
    pub base_branch: Option<String>,
    pub auto_merge: Option<bool>,
    pub local_mode: Option<bool>,
    pub mirror: Option<MirrorBackend>,
    pub remote_root: Option<String>,
    pub bot_name: Option<String>,
    pub bot_email: Option<String>,
    pub signing_key: Option<String>,
    pub api_url: Option<String>,
    #[serde(skip)]
    pub token: Option<SecretString>,
}

impl Settings {
    /// Load a YAML layer from `path`.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build a layer from environment-style lookups. Empty values count as unset.
    pub fn from_env<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            bot_username: get(keys::BOT_USERNAME),
            source_repo: get(keys::SOURCE_REPO),
            source_folder: get(keys::SOURCE_FOLDER),
            source_ref: get(keys::SOURCE_REF),
            translations_repo: get(keys::TRANSLATIONS_REPO),
            translations_folder: get(keys::TRANSLATIONS_FOLDER),
            translations_ref: get(keys::TRANSLATIONS_REF),
            base_branch: get(keys::BASE_BRANCH),
            auto_merge: get(keys::AUTO_MERGE)
                .map(|v| parse_bool(keys::AUTO_MERGE, &v))
                .transpose()?,
            local_mode: get(keys::LOCAL_MODE)
                .map(|v| parse_bool(keys::LOCAL_MODE, &v))
                .transpose()?,
            mirror: get(keys::MIRROR)
                .map(|v| {
                    v.parse().map_err(|message| ConfigError::Invalid {
                        key: keys::MIRROR,
                        message,
                    })
                })
                .transpose()?,
            remote_root: get(keys::REMOTE_ROOT),
            bot_name: get(keys::GPG_NAME),
            bot_email: get(keys::GPG_EMAIL),
            signing_key: get(keys::GPG_SIGNING_KEY),
            api_url: get(keys::API_URL),
            token: get(keys::TOKEN).map(SecretString::from),
        })
    }

    /// Overlay `higher` on top of `self`; set fields in `higher` win.
    pub fn merge(self, higher: Settings) -> Settings {
        Settings {
            bot_username: higher.bot_username.or(self.bot_username),
            source_repo: higher.source_repo.or(self.source_repo),
            source_folder: higher.source_folder.or(self.source_folder),
            source_ref: higher.source_ref.or(self.source_ref),
            translations_repo: higher.translations_repo.or(self.translations_repo),
            translations_folder: higher.translations_folder.or(self.translations_folder),
            translations_ref: higher.translations_ref.or(self.translations_ref),
            base_branch: higher.base_branch.or(self.base_branch),
            auto_merge: higher.auto_merge.or(self.auto_merge),
            local_mode: higher.local_mode.or(self.local_mode),
            mirror: higher.mirror.or(self.mirror),
            remote_root: higher.remote_root.or(self.remote_root),
            bot_name: higher.bot_name.or(self.bot_name),
            bot_email: higher.bot_email.or(self.bot_email),
            signing_key: higher.signing_key.or(self.signing_key),
            api_url: higher.api_url.or(self.api_url),
            token: higher.token.or(self.token),
        }
    }

    /// Validate into a full [`SyncRequest`].
    pub fn resolve(self) -> Result<SyncRequest, ConfigError> {
        let source = RepoLocation {
            repo: parse_repo(keys::SOURCE_REPO, self.source_repo)?,
            git_ref: self.source_ref,
            subpath: parse_subpath(keys::SOURCE_FOLDER, self.source_folder)?,
        };
        let destination = RepoLocation {
            repo: parse_repo(keys::TRANSLATIONS_REPO, self.translations_repo)?,
            git_ref: self.translations_ref,
            subpath: parse_subpath(keys::TRANSLATIONS_FOLDER, self.translations_folder)?,
        };

        Ok(SyncRequest {
            source,
            destination,
            base_branch: self
                .base_branch
                .unwrap_or_else(|| DEFAULT_BASE_BRANCH.to_string()),
            identity: BotIdentity {
                name: required(keys::GPG_NAME, self.bot_name)?,
                email: required(keys::GPG_EMAIL, self.bot_email)?,
            },
            username: self
                .bot_username
                .unwrap_or_else(|| DEFAULT_BOT_USERNAME.to_string()),
            credential: self.token.ok_or(ConfigError::Missing { key: keys::TOKEN })?,
            auto_merge: self.auto_merge.unwrap_or(false),
            local_mode: self.local_mode.unwrap_or(false),
            mirror: self.mirror.unwrap_or_default(),
            signing_key: self.signing_key,
            remote_root: self.remote_root,
            api_url: self.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        })
    }

    /// Validate only what reviewing an existing pull request needs.
    ///
    /// In local mode the credential may be absent; nothing is sent anywhere.
    pub fn resolve_review(self) -> Result<ReviewRequest, ConfigError> {
        let local_mode = self.local_mode.unwrap_or(false);
        let credential = match (self.token, local_mode) {
            (Some(token), _) => token,
            (None, true) => SecretString::from(String::new()),
            (None, false) => return Err(ConfigError::Missing { key: keys::TOKEN }),
        };

        Ok(ReviewRequest {
            forge: ForgeTarget {
                repo: parse_repo(keys::TRANSLATIONS_REPO, self.translations_repo)?,
                api_url: self.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                credential,
            },
            identity: BotIdentity {
                name: required(keys::GPG_NAME, self.bot_name)?,
                email: required(keys::GPG_EMAIL, self.bot_email)?,
            },
            local_mode,
        })
    }
}

/// Accepts `true/false/1/0/yes/no/on/off`, case-insensitive.
pub fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn required(key: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing { key })
}

/// A folder inside a checkout: relative, and free of `..`.
fn parse_subpath(key: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    let subpath = required(key, value)?;
    let path = Path::new(&subpath);
    if path.has_root() || path.is_absolute() {
        return Err(ConfigError::Invalid {
            key,
            message: format!("'{subpath}' must be relative to the repository root"),
        });
    }
    if path.components().any(|c| c == Component::ParentDir) {
        return Err(ConfigError::Invalid {
            key,
            message: format!("'{subpath}' must not contain '..'"),
        });
    }
    Ok(subpath)
}

fn parse_repo(key: &'static str, value: Option<String>) -> Result<RepoIdentity, ConfigError> {
    required(key, value)?
        .parse()
        .map_err(|message| ConfigError::Invalid { key, message })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use rstest::rstest;
    use secrecy::ExposeSecret;

    use super::*;

    pub(crate) fn full_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (keys::TOKEN, "s3cret".to_string()),
            (keys::BOT_USERNAME, "bot".to_string()),
            (keys::SOURCE_REPO, "scientific-python/scipy.org".to_string()),
            (keys::SOURCE_FOLDER, "content/en".to_string()),
            (keys::SOURCE_REF, "main".to_string()),
            (
                keys::TRANSLATIONS_REPO,
                "scientific-python/scipy.org-translations".to_string(),
            ),
            (keys::TRANSLATIONS_FOLDER, "content/en".to_string()),
            (keys::TRANSLATIONS_REF, String::new()),
            (keys::GPG_NAME, "Translations Bot".to_string()),
            (keys::GPG_EMAIL, "bot@example.org".to_string()),
        ])
    }

    fn lookup<'a>(env: &'a HashMap<&'static str, String>) -> impl Fn(&str) -> Option<String> + 'a {
        move |k| env.get(k).cloned()
    }

    pub(crate) fn sample_request() -> SyncRequest {
        let env = full_env();
        Settings::from_env(lookup(&env))
            .expect("env layer")
            .resolve()
            .expect("resolve")
    }

    #[test]
    fn resolves_complete_environment_with_defaults() {
        let req = sample_request();
        assert_eq!(req.source.repo.as_str(), "scientific-python/scipy.org");
        assert_eq!(req.source.git_ref.as_deref(), Some("main"));
        assert_eq!(req.destination.git_ref, None, "empty ref counts as unset");
        assert_eq!(req.base_branch, "main");
        assert_eq!(req.mirror, MirrorBackend::Rsync);
        assert!(!req.auto_merge);
        assert!(!req.local_mode);
        assert_eq!(req.api_url, DEFAULT_API_URL);
        assert_eq!(req.credential.expose_secret(), "s3cret");
    }

    #[rstest]
    #[case(keys::TOKEN)]
    #[case(keys::SOURCE_REPO)]
    #[case(keys::SOURCE_FOLDER)]
    #[case(keys::TRANSLATIONS_REPO)]
    #[case(keys::TRANSLATIONS_FOLDER)]
    #[case(keys::GPG_NAME)]
    #[case(keys::GPG_EMAIL)]
    fn missing_required_key_is_reported(#[case] key: &'static str) {
        let mut env = full_env();
        env.remove(key);
        let err = Settings::from_env(lookup(&env))
            .unwrap()
            .resolve()
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::Missing { key: k } if k == key),
            "got: {err}"
        );
    }

    #[rstest]
    #[case::absolute(keys::SOURCE_FOLDER, "/etc/site", "must be relative")]
    #[case::root_only(keys::TRANSLATIONS_FOLDER, "/", "must be relative")]
    #[case::parent(keys::TRANSLATIONS_FOLDER, "../elsewhere", "'..'")]
    #[case::back_to_root(keys::TRANSLATIONS_FOLDER, "docs/..", "'..'")]
    #[case::nested_parent(keys::SOURCE_FOLDER, "content/../../x/", "'..'")]
    fn unsafe_subpath_is_rejected(
        #[case] key: &'static str,
        #[case] value: &str,
        #[case] expected: &str,
    ) {
        let mut env = full_env();
        env.insert(key, value.to_string());
        let err = Settings::from_env(lookup(&env))
            .unwrap()
            .resolve()
            .unwrap_err();
        match err {
            ConfigError::Invalid { key: k, message } => {
                assert_eq!(k, key);
                assert!(message.contains(expected), "got: {message}");
            }
            other => panic!("expected Invalid, got {other}"),
        }
    }

    #[test]
    fn relative_subpaths_with_trailing_separator_are_kept() {
        let mut env = full_env();
        env.insert(keys::SOURCE_FOLDER, "content/en/".to_string());
        env.insert(keys::TRANSLATIONS_FOLDER, "./content".to_string());
        let req = Settings::from_env(lookup(&env)).unwrap().resolve().unwrap();
        assert_eq!(req.source.subpath, "content/en/");
        assert!(req.source.contents_only());
        assert_eq!(req.destination.subpath, "./content");
    }

    #[rstest]
    #[case("true", true)]
    #[case("TRUE", true)]
    #[case("1", true)]
    #[case("yes", true)]
    #[case("false", false)]
    #[case("0", false)]
    #[case("No", false)]
    fn booleans_parse(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(parse_bool(keys::AUTO_MERGE, raw).unwrap(), expected);
    }

    #[test]
    fn invalid_boolean_names_the_key() {
        let mut env = full_env();
        env.insert(keys::AUTO_MERGE, "maybe".into());
        let err = Settings::from_env(lookup(&env)).unwrap_err();
        assert!(err.to_string().contains(keys::AUTO_MERGE), "got: {err}");
    }

    #[test]
    fn invalid_repo_identity_is_rejected() {
        let mut env = full_env();
        env.insert(keys::SOURCE_REPO, "just-a-name".into());
        let err = Settings::from_env(lookup(&env))
            .unwrap()
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }), "got: {err}");
    }

    #[test]
    fn higher_layer_wins_on_merge() {
        let low = Settings {
            base_branch: Some("develop".into()),
            auto_merge: Some(true),
            ..Settings::default()
        };
        let high = Settings {
            auto_merge: Some(false),
            ..Settings::default()
        };
        let merged = low.merge(high);
        assert_eq!(merged.base_branch.as_deref(), Some("develop"));
        assert_eq!(merged.auto_merge, Some(false));
    }

    #[test]
    fn review_in_local_mode_needs_no_token() {
        let mut env = full_env();
        env.remove(keys::TOKEN);
        env.insert(keys::LOCAL_MODE, "true".into());
        let review = Settings::from_env(lookup(&env))
            .unwrap()
            .resolve_review()
            .expect("review");
        assert!(review.local_mode);
        assert_eq!(
            review.forge.repo.as_str(),
            "scientific-python/scipy.org-translations"
        );
    }

    #[test]
    fn debug_output_never_contains_token() {
        let req = sample_request();
        assert!(!format!("{req:?}").contains("s3cret"));
    }
}
