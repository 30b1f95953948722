//! Request identity and key derivation
//!
//! A [`RequestKey`] captures everything that identifies one API call: the
//! credentials, the scope, the operation name and the (filtered) parameters.
//! Cache stores derive their lookup key from it with [`RequestKey::cache_key`],
//! which never depends on the wall clock. The archive derives a dated,
//! human-readable file name with [`RequestKey::archive_path`] instead.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parameter name carrying the user id on the wire
pub const USER_ID_PARAM: &str = "userid";
/// Parameter name carrying the API key on the wire
pub const API_KEY_PARAM: &str = "apikey";

/// Partition name used when no credentials are present
pub const PUBLIC_PARTITION: &str = "public";

/// Delimiter used between key components on this platform.
///
/// Windows does not allow `:` in file names, so `#` is used there.
pub fn default_delimiter() -> char {
    if cfg!(windows) { '#' } else { ':' }
}

/// API credentials, fixed for the lifetime of a client
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Credentials {
    user_id: Option<u64>,
    api_key: Option<String>,
}

impl Credentials {
    /// Build credentials; a zero user id or an empty key counts as absent.
    pub fn new(user_id: Option<u64>, api_key: Option<impl Into<String>>) -> Self {
        Self {
            user_id: user_id.filter(|id| *id != 0),
            api_key: api_key.map(Into::into).filter(|key| !key.is_empty()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user_id(&self) -> Option<u64> {
        self.user_id
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    /// Path components of the storage partition: `<userid>/<apikey>` or `public/public`
    pub fn partition(&self) -> [String; 2] {
        match self.user_id {
            Some(user_id) => [
                user_id.to_string(),
                self.api_key.clone().unwrap_or_default(),
            ],
            None => [PUBLIC_PARTITION.to_string(), PUBLIC_PARTITION.to_string()],
        }
    }
}

/// Named string parameters of one API call
///
/// Backed by a sorted map, so iteration order is stable regardless of the order
/// parameters were inserted in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallParameters(BTreeMap<String, String>);

impl CallParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Copy without zero-length values
    pub fn filtered(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(_, value)| !value.is_empty())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// `self` laid over `base`: values from `self` win on name collisions
    pub fn overlaid_on(&self, base: &CallParameters) -> Self {
        let mut merged = base.0.clone();
        merged.extend(self.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(merged)
    }

    /// Parameters as sent on the wire, with credential fields injected when present
    pub fn with_credentials(&self, credentials: &Credentials) -> Self {
        let mut outgoing = self.clone();
        if let Some(user_id) = credentials.user_id() {
            outgoing.insert(USER_ID_PARAM, user_id.to_string());
        }
        if let Some(api_key) = credentials.api_key() {
            outgoing.insert(API_KEY_PARAM, api_key);
        }
        outgoing
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CallParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for CallParameters {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<BTreeMap<String, String>> for CallParameters {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// Textual form of the parameters: `key<d>value<d>key<d>value`
///
/// Empty values and the credential parameters are skipped.
pub fn param_string(params: &CallParameters, delimiter: char) -> String {
    let mut out = String::new();
    for (name, value) in params.iter() {
        if value.is_empty() || name == USER_ID_PARAM || name == API_KEY_PARAM {
            continue;
        }
        out.push_str(name);
        out.push(delimiter);
        out.push_str(value);
        out.push(delimiter);
    }
    out.pop();
    out
}

/// Identity of one API call, handed to the cache and archive ports
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub credentials: Credentials,
    pub scope: String,
    pub operation: String,
    pub params: CallParameters,
}

impl RequestKey {
    /// Parameters are filtered of empty values on construction.
    pub fn new(
        credentials: Credentials,
        scope: impl Into<String>,
        operation: impl Into<String>,
        params: &CallParameters,
    ) -> Self {
        Self {
            credentials,
            scope: scope.into(),
            operation: operation.into(),
            params: params.filtered(),
        }
    }

    /// Cache lookup key; a pure function of the request, independent of time
    pub fn cache_key(&self, delimiter: char) -> String {
        let [user, key] = self.credentials.partition();
        let mut out = format!(
            "{user}/{key}{d}{scope}{d}{operation}",
            d = delimiter,
            scope = self.scope,
            operation = self.operation,
        );
        let args = param_string(&self.params, delimiter);
        if !args.is_empty() {
            out.push(delimiter);
            out.push_str(&args);
        }
        out
    }

    /// Directory of this request below an archive root, e.g. `2024-05-01/public/public/server/ServerStatus`
    pub fn archive_dir(&self, now: DateTime<Utc>) -> PathBuf {
        let [user, key] = self.credentials.partition();
        let mut dir = PathBuf::from(now.format("%Y-%m-%d").to_string());
        dir.push(user);
        dir.push(key);
        dir.push(&self.scope);
        dir.push(&self.operation);
        dir
    }

    /// Time-stamped file name, e.g. `Request_20240501-120000_characterID:42.xml`
    pub fn archive_filename(&self, now: DateTime<Utc>, delimiter: char) -> String {
        let args = param_string(&self.params, delimiter);
        let stamp = now.format("%Y%m%d-%H%M%S");
        if args.is_empty() {
            format!("Request_{stamp}.xml")
        } else {
            format!("Request_{stamp}_{args}.xml")
        }
    }

    /// Relative archive path of this request at `now`
    pub fn archive_path(&self, now: DateTime<Utc>, delimiter: char) -> PathBuf {
        self.archive_dir(now)
            .join(self.archive_filename(now, delimiter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user() -> Credentials {
        Credentials::new(Some(123456), Some("secretkey"))
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap()
    }

    #[test]
    fn test_credentials_treat_zero_and_empty_as_absent() {
        let creds = Credentials::new(Some(0), Some(""));
        assert!(creds.is_anonymous());
        assert_eq!(creds.api_key(), None);
        assert_eq!(creds, Credentials::anonymous());
    }

    #[test]
    fn test_partition() {
        assert_eq!(user().partition(), ["123456".to_string(), "secretkey".to_string()]);
        assert_eq!(
            Credentials::anonymous().partition(),
            ["public".to_string(), "public".to_string()]
        );
    }

    #[test]
    fn test_param_string_filters_and_orders() {
        let params = CallParameters::from([
            ("characterID", "42"),
            ("empty", ""),
            ("userid", "123456"),
            ("apikey", "secretkey"),
            ("accountKey", "1000"),
        ]);
        assert_eq!(param_string(&params, ':'), "accountKey:1000:characterID:42");
        assert_eq!(param_string(&CallParameters::new(), ':'), "");
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let params_a = CallParameters::new().with("b", "2").with("a", "1");
        let params_b = CallParameters::new().with("a", "1").with("b", "2");

        let key_a = RequestKey::new(user(), "char", "WalletJournal", &params_a);
        let key_b = RequestKey::new(user(), "char", "WalletJournal", &params_b);

        assert_eq!(key_a.cache_key(':'), key_b.cache_key(':'));
        assert_eq!(
            key_a.cache_key(':'),
            "123456/secretkey:char:WalletJournal:a:1:b:2"
        );
    }

    #[test]
    fn test_cache_key_ignores_empty_values() {
        let with_empty = CallParameters::from([("characterID", "42"), ("beforeRefID", "")]);
        let without = CallParameters::from([("characterID", "42")]);

        let a = RequestKey::new(user(), "char", "WalletJournal", &with_empty);
        let b = RequestKey::new(user(), "char", "WalletJournal", &without);
        assert_eq!(a.cache_key(':'), b.cache_key(':'));
        assert!(!a.params.contains("beforeRefID"));
    }

    #[test]
    fn test_cache_key_differs_by_inputs() {
        let params = CallParameters::from([("characterID", "42")]);
        let base = RequestKey::new(user(), "char", "SkillQueue", &params).cache_key(':');

        let other_params = CallParameters::from([("characterID", "43")]);
        let other_scope = RequestKey::new(user(), "corp", "SkillQueue", &params).cache_key(':');
        let other_op = RequestKey::new(user(), "char", "SkillInTraining", &params).cache_key(':');
        let other_user =
            RequestKey::new(Credentials::anonymous(), "char", "SkillQueue", &params).cache_key(':');
        let other_value =
            RequestKey::new(user(), "char", "SkillQueue", &other_params).cache_key(':');

        for other in [other_scope, other_op, other_user, other_value] {
            assert_ne!(base, other);
        }
    }

    #[test]
    fn test_cache_key_uses_delimiter() {
        let params = CallParameters::from([("characterID", "42")]);
        let key = RequestKey::new(Credentials::anonymous(), "eve", "CharacterName", &params);
        assert_eq!(key.cache_key('#'), "public/public#eve#CharacterName#characterID#42");
    }

    #[test]
    fn test_archive_path_layout() {
        let params = CallParameters::from([("characterID", "42"), ("apikey", "secretkey")]);
        let key = RequestKey::new(user(), "char", "CharacterSheet", &params);

        let path = key.archive_path(fixed_time(), ':');
        assert_eq!(
            path,
            PathBuf::from(
                "2024-05-01/123456/secretkey/char/CharacterSheet/Request_20240501-123045_characterID:42.xml"
            )
        );
    }

    #[test]
    fn test_archive_filename_without_params() {
        let key = RequestKey::new(
            Credentials::anonymous(),
            "server",
            "ServerStatus",
            &CallParameters::new(),
        );
        assert_eq!(
            key.archive_filename(fixed_time(), ':'),
            "Request_20240501-123045.xml"
        );
        assert_eq!(
            key.archive_dir(fixed_time()),
            PathBuf::from("2024-05-01/public/public/server/ServerStatus")
        );
    }

    #[test]
    fn test_overlay_and_credential_injection() {
        let defaults = CallParameters::from([("version", "2"), ("characterID", "1")]);
        let caller = CallParameters::from([("characterID", "42")]);

        let merged = caller.overlaid_on(&defaults);
        assert_eq!(merged.get("characterID"), Some("42"));
        assert_eq!(merged.get("version"), Some("2"));

        let outgoing = merged.with_credentials(&user());
        assert_eq!(outgoing.get(USER_ID_PARAM), Some("123456"));
        assert_eq!(outgoing.get(API_KEY_PARAM), Some("secretkey"));

        let anonymous = merged.with_credentials(&Credentials::anonymous());
        assert!(!anonymous.contains(USER_ID_PARAM));
        assert!(!anonymous.contains(API_KEY_PARAM));
    }

    #[test]
    fn test_key_without_api_key_injects_only_userid() {
        let creds = Credentials::new(Some(7), None::<String>);
        let outgoing = CallParameters::new().with_credentials(&creds);
        assert_eq!(outgoing.get(USER_ID_PARAM), Some("7"));
        assert!(!outgoing.contains(API_KEY_PARAM));
    }
}
