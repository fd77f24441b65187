use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::cache::Cache;
use super::{FetchOptions, JsonTransformer, ParamStore, ParameterError, Transformer};

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(5);

/// A key and the options that can change what the store returns for it.
type CacheKey = (String, FetchOptions);

/// Per-call retrieval options.
#[derive(Clone, Debug, Default)]
pub struct GetOptions {
    /// Overrides the provider's default max age.
    pub max_age: Option<Duration>,
    /// Skips the cache lookup; the fetched value is still cached.
    pub force_fetch: bool,
    pub fetch: FetchOptions,
    pub transformer: Option<Arc<dyn Transformer>>,
}

impl GetOptions {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn force_fetch(mut self, force_fetch: bool) -> Self {
        self.force_fetch = force_fetch;
        self
    }

    pub fn decrypt(mut self, decrypt: bool) -> Self {
        self.fetch.decrypt = decrypt;
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.fetch.recursive = recursive;
        self
    }

    pub fn version_stage<S: Into<String>>(mut self, stage: S) -> Self {
        self.fetch.version_stage = Some(stage.into());
        self
    }

    pub fn version_id<S: Into<String>>(mut self, id: S) -> Self {
        self.fetch.version_id = Some(id.into());
        self
    }

    pub fn transformer<T: Transformer + 'static>(mut self, transformer: T) -> Self {
        self.transformer = Some(Arc::new(transformer));
        self
    }
}

/// A parameter store fronted by a cache.
///
/// Values are cached raw, per provider instance and per key and fetch
/// options, and transformed on every read, so one key can be read with
/// different transformers.
#[derive(Clone)]
pub struct ParamProvider {
    store: Arc<dyn ParamStore>,
    max_age: Duration,
    decrypt: bool,
    values: Arc<Cache<CacheKey, String>>,
    paths: Arc<Cache<CacheKey, HashMap<String, String>>>,
}

impl fmt::Debug for ParamProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ParamProvider")
            .field("max_age", &self.max_age)
            .field("decrypt", &self.decrypt)
            .finish_non_exhaustive()
    }
}

impl ParamProvider {
    pub fn new<S: ParamStore + 'static>(store: S) -> Self {
        Self::from_arc(Arc::new(store))
    }

    pub fn from_arc(store: Arc<dyn ParamStore>) -> Self {
        ParamProvider {
            store,
            max_age: DEFAULT_MAX_AGE,
            decrypt: false,
            values: Default::default(),
            paths: Default::default(),
        }
    }

    /// Sets the default max age for cached values.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Decrypts values even when a call does not ask for it.
    pub fn with_decryption(mut self, decrypt: bool) -> Self {
        self.decrypt = decrypt;
        self
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Fetches `key` and returns it as text. String results of the
    /// transformer are returned as-is, anything else as JSON.
    pub async fn get(&self, key: &str, options: &GetOptions) -> Result<String, ParameterError> {
        Ok(match self.get_value(key, options).await? {
            Value::String(value) => value,
            value => value.to_string(),
        })
    }

    /// Fetches `key` and runs it through the transformer, if any.
    pub async fn get_value(&self, key: &str, options: &GetOptions) -> Result<Value, ParameterError> {
        let raw = self.get_raw(key, options).await?;
        match options.transformer {
            Some(ref transformer) => apply(transformer.as_ref(), key, &raw),
            None => Ok(Value::String(raw)),
        }
    }

    /// Fetches `key` and deserializes it, decoding JSON unless another
    /// transformer is given.
    pub async fn get_object<T: DeserializeOwned>(&self, key: &str, options: &GetOptions) -> Result<T, ParameterError> {
        let raw = self.get_raw(key, options).await?;
        let value = match options.transformer {
            Some(ref transformer) => apply(transformer.as_ref(), key, &raw)?,
            None => apply(&JsonTransformer, key, &raw)?,
        };
        serde_json::from_value(value).map_err(|source| ParameterError::Deserialize {
            key: key.to_owned(),
            source,
        })
    }

    /// Fetches several keys, going to the store only for those not cached.
    pub async fn get_many(&self, keys: &[&str], options: &GetOptions) -> Result<HashMap<String, String>, ParameterError> {
        let max_age = self.effective_max_age(options);
        let store = &self.store;
        let fetch = &self.fetch_options(options);
        let keys: Vec<CacheKey> = keys.iter().map(|&key| (key.to_owned(), fetch.clone())).collect();
        let values = self
            .values
            .get_or_fetch_many(&keys, max_age, options.force_fetch, |missing| async move {
                let names: Vec<String> = missing.into_iter().map(|(key, _)| key).collect();
                let values = store.get_values(&names, fetch).await?;
                Ok::<_, ParameterError>(values.into_iter().map(|(key, value)| ((key, fetch.clone()), value)).collect())
            })
            .await?;
        transform_all(options, values.into_iter().map(|((key, _), value)| (key, value)).collect())
    }

    /// Fetches every value under `path`, keyed relative to it.
    pub async fn get_multiple(&self, path: &str, options: &GetOptions) -> Result<HashMap<String, String>, ParameterError> {
        let max_age = self.effective_max_age(options);
        let store = &self.store;
        let fetch = self.fetch_options(options);
        let cache_key = (path.to_owned(), fetch.clone());
        let values = self
            .paths
            .get_or_fetch(&cache_key, max_age, options.force_fetch, || store.get_multiple_values(path, &fetch))
            .await?;
        transform_all(options, values)
    }

    /// Drops every cached value.
    pub fn clear_cache(&self) {
        self.values.clear();
        self.paths.clear();
    }

    async fn get_raw(&self, key: &str, options: &GetOptions) -> Result<String, ParameterError> {
        let max_age = self.effective_max_age(options);
        let store = &self.store;
        let fetch = self.fetch_options(options);
        let cache_key = (key.to_owned(), fetch.clone());
        self.values
            .get_or_fetch(&cache_key, max_age, options.force_fetch, || store.get_value(key, &fetch))
            .await
    }

    fn effective_max_age(&self, options: &GetOptions) -> Duration {
        options.max_age.unwrap_or(self.max_age)
    }

    fn fetch_options(&self, options: &GetOptions) -> FetchOptions {
        FetchOptions {
            decrypt: options.fetch.decrypt || self.decrypt,
            ..options.fetch.clone()
        }
    }
}

/// Runs every value through the transformer, if any, rendering
/// non-string results as JSON text.
fn transform_all(options: &GetOptions, values: HashMap<String, String>) -> Result<HashMap<String, String>, ParameterError> {
    let transformer = match options.transformer {
        Some(ref transformer) => transformer,
        None => return Ok(values),
    };
    values
        .into_iter()
        .map(|(key, raw)| {
            let value = match apply(transformer.as_ref(), &key, &raw)? {
                Value::String(value) => value,
                value => value.to_string(),
            };
            Ok((key, value))
        })
        .collect()
}

fn apply(transformer: &dyn Transformer, key: &str, raw: &str) -> Result<Value, ParameterError> {
    transformer.transform(raw).map_err(|source| ParameterError::Transform {
        key: key.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{Base64Transformer, TransformError};
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store that counts backend calls.
    #[derive(Default)]
    struct CountingStore {
        values: Mutex<HashMap<String, String>>,
        calls: AtomicUsize,
        failing: AtomicBool,
        last_options: Mutex<Option<FetchOptions>>,
    }

    impl CountingStore {
        fn with(values: &[(&str, &str)]) -> Arc<Self> {
            let store = CountingStore::default();
            {
                let mut map = store.values.lock().unwrap();
                for (key, value) in values {
                    map.insert(key.to_string(), value.to_string());
                }
            }
            Arc::new(store)
        }

        fn set(&self, key: &str, value: &str) {
            self.values.lock().unwrap().insert(key.into(), value.into());
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ParamStore for CountingStore {
        async fn get_value(&self, key: &str, options: &FetchOptions) -> Result<String, ParameterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_options.lock().unwrap() = Some(options.clone());
            if self.failing.load(Ordering::SeqCst) {
                return Err(ParameterError::provider(
                    key,
                    "throttled".into(),
                    std::io::Error::new(std::io::ErrorKind::Other, "throttled"),
                ));
            }
            self.values
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| ParameterError::not_found(key))
        }

        async fn get_multiple_values(&self, path: &str, _options: &FetchOptions) -> Result<HashMap<String, String>, ParameterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let values = self.values.lock().unwrap();
            Ok(values
                .iter()
                .filter(|(key, _)| key.starts_with(path))
                .map(|(key, value)| (crate::parameters::store::relative_name(path, key).to_owned(), value.clone()))
                .collect())
        }
    }

    fn provider(store: &Arc<CountingStore>) -> ParamProvider {
        ParamProvider::from_arc(store.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn cached_within_max_age() {
        let store = CountingStore::with(&[("/app/key", "v1")]);
        let provider = provider(&store);
        let options = GetOptions::new();

        assert_eq!(provider.get("/app/key", &options).await.unwrap(), "v1");
        store.set("/app/key", "v2");
        assert_eq!(provider.get("/app/key", &options).await.unwrap(), "v1");
        assert_eq!(store.calls(), 1);

        tokio::time::advance(DEFAULT_MAX_AGE + Duration::from_millis(1)).await;
        assert_eq!(provider.get("/app/key", &options).await.unwrap(), "v2");
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn per_call_max_age() {
        let store = CountingStore::with(&[("/app/key", "v1")]);
        let provider = provider(&store).with_max_age(Duration::from_secs(1));
        let options = GetOptions::new().max_age(Duration::from_secs(60));

        provider.get("/app/key", &options).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        provider.get("/app/key", &options).await.unwrap();
        assert_eq!(store.calls(), 1);

        provider.get("/app/key", &GetOptions::new()).await.unwrap();
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn fetch_options_reach_the_store() {
        let store = CountingStore::with(&[("/app/key", "v1")]);
        let provider = provider(&store).with_decryption(true);

        provider
            .get("/app/key", &GetOptions::new().version_stage("AWSCURRENT"))
            .await
            .unwrap();
        let options = store.last_options.lock().unwrap().clone().unwrap();
        assert!(options.decrypt);
        assert_eq!(options.version_stage.as_deref(), Some("AWSCURRENT"));
    }

    #[tokio::test]
    async fn cache_is_per_provider() {
        let store = CountingStore::with(&[("/app/key", "v1")]);
        provider(&store).get("/app/key", &GetOptions::new()).await.unwrap();
        provider(&store).get("/app/key", &GetOptions::new()).await.unwrap();
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn force_fetch() {
        let store = CountingStore::with(&[("/app/key", "v1")]);
        let provider = provider(&store);

        provider.get("/app/key", &GetOptions::new()).await.unwrap();
        store.set("/app/key", "v2");
        let value = provider.get("/app/key", &GetOptions::new().force_fetch(true)).await.unwrap();
        assert_eq!(value, "v2");
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_not_cached() {
        let store = CountingStore::with(&[("/app/key", "v1")]);
        let provider = provider(&store);

        assert!(matches!(
            provider.get("/missing", &GetOptions::new()).await,
            Err(ParameterError::NotFound { .. })
        ));
        assert!(provider.get("/missing", &GetOptions::new()).await.is_err());
        assert_eq!(store.calls(), 2);

        provider.get("/app/key", &GetOptions::new()).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        store.failing.store(true, Ordering::SeqCst);
        assert!(matches!(
            provider.get("/app/key", &GetOptions::new()).await,
            Err(ParameterError::Provider { .. })
        ));

        store.failing.store(false, Ordering::SeqCst);
        store.set("/app/key", "v2");
        assert_eq!(provider.get("/app/key", &GetOptions::new()).await.unwrap(), "v2");
    }

    #[tokio::test]
    async fn transformers() {
        let store = CountingStore::with(&[
            ("/app/config", r#"{"host":"db.local","port":5432}"#),
            ("/app/encoded", "c2VjcmV0"),
            ("/app/broken", "{nope"),
        ]);
        let provider = provider(&store);

        let decoded = provider
            .get("/app/encoded", &GetOptions::new().transformer(Base64Transformer))
            .await
            .unwrap();
        assert_eq!(decoded, "secret");

        // raw value is cached, a second read can use another transformer
        let raw = provider.get("/app/encoded", &GetOptions::new()).await.unwrap();
        assert_eq!(raw, "c2VjcmV0");
        assert_eq!(store.calls(), 1);

        let value = provider
            .get_value("/app/config", &GetOptions::new().transformer(JsonTransformer))
            .await
            .unwrap();
        assert_eq!(value["port"], 5432);

        let err = provider
            .get("/app/broken", &GetOptions::new().transformer(JsonTransformer))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ParameterError::Transform {
                source: TransformError::Json(..),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn objects() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Database {
            host: String,
            port: u16,
        }

        let store = CountingStore::with(&[("/app/config", r#"{"host":"db.local","port":5432}"#)]);
        let provider = provider(&store);

        let db: Database = provider.get_object("/app/config", &GetOptions::new()).await.unwrap();
        assert_eq!(db, Database { host: "db.local".into(), port: 5432 });

        let err = provider.get_object::<Vec<String>>("/app/config", &GetOptions::new()).await.unwrap_err();
        assert!(matches!(err, ParameterError::Deserialize { .. }));
    }

    #[tokio::test]
    async fn many_fetches_only_misses() {
        let store = CountingStore::with(&[("/a", "1"), ("/b", "2"), ("/c", "3")]);
        let provider = provider(&store);

        provider.get("/a", &GetOptions::new()).await.unwrap();
        let values = provider.get_many(&["/a", "/b", "/c"], &GetOptions::new()).await.unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values["/b"], "2");
        assert_eq!(store.calls(), 3);

        provider.get_many(&["/a", "/b", "/c"], &GetOptions::new()).await.unwrap();
        assert_eq!(store.calls(), 3);
    }

    #[tokio::test]
    async fn multiple_by_path() {
        let store = CountingStore::with(&[("/app/db/host", "db.local"), ("/app/port", "5432"), ("/other", "x")]);
        let provider = provider(&store);

        let values = provider.get_multiple("/app", &GetOptions::new()).await.unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values["db/host"], "db.local");

        provider.get_multiple("/app", &GetOptions::new()).await.unwrap();
        assert_eq!(store.calls(), 1);

        provider.clear_cache();
        provider.get_multiple("/app", &GetOptions::new()).await.unwrap();
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn options_are_part_of_the_cache_key() {
        let store = CountingStore::with(&[("db", "v1")]);
        let provider = provider(&store);
        let current = GetOptions::new().version_stage("AWSCURRENT");
        let previous = GetOptions::new().version_stage("AWSPREVIOUS");
        let decrypted = GetOptions::new().decrypt(true);

        for options in [&current, &previous, &decrypted] {
            provider.get("db", options).await.unwrap();
            assert_eq!(store.last_options.lock().unwrap().as_ref(), Some(&options.fetch));
        }
        assert_eq!(store.calls(), 3);

        for options in [&current, &previous, &decrypted] {
            provider.get("db", options).await.unwrap();
        }
        assert_eq!(store.calls(), 3);
    }

    #[tokio::test]
    async fn multiple_by_path_transformed() {
        let store = CountingStore::with(&[("/app/one", "b25l"), ("/app/two", "dHdv"), ("/bad/config", "{nope")]);
        let provider = provider(&store);

        let values = provider
            .get_multiple("/app", &GetOptions::new().transformer(Base64Transformer))
            .await
            .unwrap();
        assert_eq!(values["one"], "one");
        assert_eq!(values["two"], "two");

        let raw = provider.get_multiple("/app", &GetOptions::new()).await.unwrap();
        assert_eq!(raw["one"], "b25l");
        assert_eq!(store.calls(), 1);

        let err = provider
            .get_multiple("/bad", &GetOptions::new().transformer(JsonTransformer))
            .await
            .unwrap_err();
        match err {
            ParameterError::Transform { key, source: TransformError::Json(..) } => assert_eq!(key, "config"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    /// Store that takes a while to answer.
    #[derive(Default)]
    struct SlowStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ParamStore for SlowStore {
        async fn get_value(&self, key: &str, _options: &FetchOptions) -> Result<String, ParameterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(format!("value of {}", key))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reads_share_one_fetch() {
        let store = Arc::new(SlowStore::default());
        let provider = ParamProvider::from_arc(store.clone()).with_max_age(Duration::from_secs(60));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move { provider.get("/app/key", &GetOptions::new()).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "value of /app/key");
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_single_and_batch_reads_share_fetches() {
        let store = Arc::new(SlowStore::default());
        let provider = ParamProvider::from_arc(store.clone()).with_max_age(Duration::from_secs(60));

        let mut singles = Vec::new();
        let mut batches = Vec::new();
        for _ in 0..4 {
            let single = provider.clone();
            singles.push(tokio::spawn(async move { single.get("/app/key", &GetOptions::new()).await }));
            let batch = provider.clone();
            batches.push(tokio::spawn(async move {
                batch.get_many(&["/app/other", "/app/key"], &GetOptions::new()).await
            }));
        }
        for task in singles {
            assert_eq!(task.await.unwrap().unwrap(), "value of /app/key");
        }
        for task in batches {
            let values = task.await.unwrap().unwrap();
            assert_eq!(values["/app/other"], "value of /app/other");
            assert_eq!(values["/app/key"], "value of /app/key");
        }
        // one fetch per key, however the tasks interleave
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }
}
