//! 凭证池属性测试

use crate::credential::{
    declared_pools, split_secret, ConfiguredSecrets, PoolBuilder, POOL_GEMINI, POOL_OFFICIAL,
    POOL_REVERSE,
};
use crate::models::RoutingClass;
use proptest::prelude::*;

fn arb_routing_class() -> impl Strategy<Value = RoutingClass> {
    prop_oneof![
        Just(RoutingClass::Reverse),
        Just(RoutingClass::Gemini),
        Just(RoutingClass::Official),
    ]
}

/// 每个池 0~3 个凭证，偶尔夹带空白项
fn arb_secret_string() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof!["[a-z0-9]{4,8}".prop_map(|s| format!("sk-{s}")), Just(" ".to_string())],
        0..=3,
    )
    .prop_map(|parts| parts.join(","))
}

proptest! {
    /// 构建结果中不出现空池，且池顺序与池内顺序都与配置一致
    #[test]
    fn prop_pool_order_and_no_empty_pools(
        class in arb_routing_class(),
        reverse in arb_secret_string(),
        official in arb_secret_string(),
        gemini in arb_secret_string(),
    ) {
        let mut secrets = ConfiguredSecrets::new();
        secrets.insert_raw(POOL_REVERSE, &reverse);
        secrets.insert_raw(POOL_OFFICIAL, &official);
        secrets.insert_raw(POOL_GEMINI, &gemini);

        let builder = PoolBuilder::default();
        let pool = builder.build(class, &secrets);

        for name in pool.pool_names() {
            prop_assert!(secrets.has_pool(name), "空池 {} 不应出现", name);
        }

        let declared: Vec<&str> = declared_pools(class)
            .iter()
            .copied()
            .filter(|name| secrets.has_pool(name))
            .collect();
        let use_fallback = declared.is_empty() && secrets.has_pool(builder.fallback_pool());
        let expected_names: Vec<&str> = if use_fallback {
            vec![builder.fallback_pool()]
        } else {
            declared
        };
        prop_assert_eq!(pool.pool_names(), expected_names.clone());

        let mut expected = Vec::new();
        for name in &expected_names {
            for key in secrets.credentials(name) {
                expected.push((name.to_string(), key.clone()));
            }
        }
        let actual: Vec<(String, String)> = pool
            .iter()
            .map(|c| (c.pool_name.clone(), c.credential.clone()))
            .collect();
        prop_assert_eq!(actual, expected);
    }

    /// 只要兜底池有密钥，任何路由类别都不会得到空列表
    #[test]
    fn prop_fallback_prevents_empty(class in arb_routing_class(), key in "[a-z]{6}") {
        let mut secrets = ConfiguredSecrets::new();
        secrets.insert_raw(POOL_REVERSE, &key);
        let pool = PoolBuilder::default().build(class, &secrets);
        prop_assert!(!pool.is_empty());
    }

    /// 池内序号从 0 连续递增
    #[test]
    fn prop_intra_pool_index_contiguous(raw in arb_secret_string()) {
        let mut secrets = ConfiguredSecrets::new();
        secrets.insert_raw(POOL_OFFICIAL, &raw);
        let pool = PoolBuilder::default().build(RoutingClass::Official, &secrets);
        let indexes: Vec<usize> = pool.iter().map(|c| c.index).collect();
        let expected: Vec<usize> = (0..split_secret(&raw).len()).collect();
        prop_assert_eq!(indexes, expected);
    }
}
