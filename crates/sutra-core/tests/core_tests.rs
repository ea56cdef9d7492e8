use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::{Figment, Jail};

use sutra_core::config::{resolve_with_base, Config, EmbeddingProvider, EngineConfig};
use sutra_core::types::SourceTag;

fn layered() -> Figment {
    Figment::from(Serialized::defaults(EngineConfig::default()))
        .merge(Toml::file("config.toml"))
        .merge(Env::prefixed("APP_").split("__"))
}

#[test]
fn defaults_match_documented_values() {
    let cfg = EngineConfig::default();
    assert_eq!(cfg.fusion.rrf_k, 60);
    assert_eq!(cfg.fusion.final_top_k, 15);
    assert_eq!(cfg.fusion.weights.weight(SourceTag::Semantic), 0.5);
    assert_eq!(cfg.fusion.weights.weight(SourceTag::Lexical), 0.3);
    assert_eq!(cfg.fusion.weights.weight(SourceTag::Dictionary), 0.2);
    assert_eq!(cfg.retrieval.semantic_top_k, 10);
    assert_eq!(cfg.retrieval.lexical_top_k, 10);
    assert_eq!(cfg.retrieval.dictionary_top_k, 5);
    assert_eq!(cfg.context.neighbor_window, 2);
    cfg.validate().expect("defaults are valid");
}

#[test]
fn toml_and_env_layers_override_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
                [fusion]
                rrf_k = 30
                [context]
                max_total_chars = 4000
            "#,
        )?;
        jail.set_env("APP_FUSION__FINAL_TOP_K", "7");
        jail.set_env("APP_EMBEDDING__PROVIDER", "hash");

        let engine = Config::from_figment(layered(), "test").engine().expect("engine config");
        assert_eq!(engine.fusion.rrf_k, 30);
        assert_eq!(engine.fusion.final_top_k, 7);
        assert_eq!(engine.context.max_total_chars, 4000);
        // untouched keys keep their defaults
        assert_eq!(engine.context.max_item_chars, 1_500);
        assert_eq!(engine.embedding.provider, EmbeddingProvider::Hash);
        Ok(())
    });
}

#[test]
fn invalid_budgets_are_rejected() {
    let mut cfg = EngineConfig::default();
    cfg.context.max_item_chars = cfg.context.max_total_chars + 1;
    assert!(cfg.validate().is_err(), "per-item budget larger than total");

    let mut cfg = EngineConfig::default();
    cfg.fusion.weights.lexical = -0.1;
    assert!(cfg.validate().is_err(), "negative weight");

    let mut cfg = EngineConfig::default();
    cfg.fusion.weights.semantic = f64::NAN;
    assert!(cfg.validate().is_err(), "non-finite weight");

    let mut cfg = EngineConfig::default();
    cfg.fusion.rrf_k = 0;
    assert!(cfg.validate().is_err(), "zero rrf_k");
}

#[test]
fn relative_paths_resolve_against_base() {
    let base = Path::new("/srv/sutra");
    assert_eq!(resolve_with_base(base, "data/glossary.json"), base.join("data/glossary.json"));
    assert_eq!(resolve_with_base(base, "/abs/index"), Path::new("/abs/index"));

    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = EngineConfig::default();
    assert!(cfg.data.tantivy_index_dir(tmp.path()).starts_with(tmp.path()));
}
