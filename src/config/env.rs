use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("KEYSTONE_EMBEDDING_PROVIDER") {
            self.embedding.provider = v;
        }
        if let Ok(v) = std::env::var("KEYSTONE_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("KEYSTONE_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("KEYSTONE_QDRANT_URL") {
            self.store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("KEYSTONE_COLLECTION") {
            self.store.collection = v;
        }
        if let Ok(v) = std::env::var("KEYSTONE_BATCH_SIZE") {
            if let Ok(size) = v.parse::<usize>() {
                self.walker.batch_size = size;
            } else {
                tracing::warn!("ignoring invalid KEYSTONE_BATCH_SIZE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("KEYSTONE_TOP_K") {
            if let Ok(k) = v.parse::<usize>() {
                self.retrieval.top_k = k;
            } else {
                tracing::warn!("ignoring invalid KEYSTONE_TOP_K value: {v}");
            }
        }
        if let Ok(v) = std::env::var("KEYSTONE_MAX_ATTEMPTS") {
            if let Ok(attempts) = v.parse::<u32>() {
                self.indexer.max_attempts = attempts;
            } else {
                tracing::warn!("ignoring invalid KEYSTONE_MAX_ATTEMPTS value: {v}");
            }
        }
    }
}
