use abla_params::AblaConfig;

use crate::state::AblaState;

impl AblaState {
    /// Worst-case limit `count` blocks ahead, assuming every block until then
    /// is exactly as large as its limit allows.
    pub fn calc_lookahead_block_size_limit(&self, config: &AblaConfig, count: usize) -> u64 {
        self.calc_lookahead_block_size_limit_with(config, count, false)
    }

    pub fn calc_lookahead_block_size_limit_with(
        &self,
        config: &AblaConfig,
        count: usize,
        disable_2gb_cap: bool,
    ) -> u64 {
        let mut state = *self;
        for _ in 0..count {
            let limit = state.next_block_size_limit_with(config, disable_2gb_cap);
            state = state.next_block_state(config, limit);
        }
        state.block_size_limit_with(disable_2gb_cap)
    }
}

#[cfg(test)]
mod tests {
    use abla_params::{
        AblaParams, ZetaXB7,
        constants::{DEFAULT_CONSENSUS_BLOCK_SIZE, MAX_CONSENSUS_BLOCK_SIZE, ONE_MEGABYTE},
    };
    use proptest::prelude::*;

    use super::*;

    fn default_config() -> AblaConfig {
        AblaConfig::new_default(DEFAULT_CONSENSUS_BLOCK_SIZE, false).unwrap()
    }

    #[test]
    fn test_lookahead_vectors() {
        let config = AblaConfig::new_default(2 * ONE_MEGABYTE, false).unwrap();
        let state = AblaState::new(1_129, 1_000_000, 1_000_000);
        assert_eq!(state.calc_lookahead_block_size_limit(&config, 2048), 2_234_156);

        let config = default_config();
        let state = AblaState::new(403_438_931, 93_377_312, 310_061_619);
        assert_eq!(state.calc_lookahead_block_size_limit(&config, 500), 406_127_292);

        let initial = AblaState::initial(&config, 0);
        assert_eq!(initial.calc_lookahead_block_size_limit(&config, 2048), 35_847_033);
    }

    #[test]
    fn test_lookahead_zero_count() {
        let config = default_config();
        let state = AblaState::new(0, 20_000_000, 17_000_000);
        assert_eq!(state.calc_lookahead_block_size_limit(&config, 0), 37_000_000);
    }

    #[test]
    fn test_lookahead_capped() {
        let config = default_config();
        let state = AblaState::new(0, 1_500_000_000, 600_000_000);
        assert_eq!(
            state.calc_lookahead_block_size_limit(&config, 10),
            MAX_CONSENSUS_BLOCK_SIZE
        );
        assert!(state.calc_lookahead_block_size_limit_with(&config, 10, true) > 2_100_000_000);
    }

    fn arb_config() -> impl Strategy<Value = AblaConfig> {
        (129u64..=256, 9484u64..=151744, 9484u64..=151744, 0u64..=32).prop_filter_map(
            "valid config",
            |(zeta, gamma, theta, delta)| {
                AblaConfig::derive(&AblaParams {
                    epsilon0: 16 * ONE_MEGABYTE,
                    beta0: 16 * ONE_MEGABYTE,
                    gamma_reciprocal: gamma,
                    zeta_xb7: ZetaXB7::from_raw(zeta),
                    theta_reciprocal: theta,
                    delta,
                })
                .ok()
            },
        )
    }

    fn arb_state(config: AblaConfig) -> impl Strategy<Value = (AblaConfig, AblaState)> {
        let eps = config.epsilon0()..=config.epsilon_max();
        let beta = config.beta0()..=config.beta_max();
        (any::<u64>(), eps, beta)
            .prop_map(move |(bs, e, b)| (config.clone(), AblaState::new(bs, e, b)))
    }

    proptest! {
        #[test]
        fn proptest_next_state_in_range(
            (config, state) in arb_config().prop_flat_map(arb_state),
            next_size in any::<u64>(),
        ) {
            let next = state.try_next_block_state(&config, next_size).unwrap();
            prop_assert!(next.is_valid(&config));
            prop_assert_eq!(next.block_size(), next_size);
        }

        #[test]
        fn proptest_full_blocks_grow_limit(
            config in (129u64..=256, 9484u64..=151744, 9484u64..=151744, 0u64..=32)
                .prop_filter_map("valid config", |(zeta, gamma, theta, delta)| {
                    AblaConfig::derive(&AblaParams {
                        epsilon0: 64 * ONE_MEGABYTE,
                        beta0: 64 * ONE_MEGABYTE,
                        gamma_reciprocal: gamma,
                        zeta_xb7: ZetaXB7::from_raw(zeta),
                        theta_reciprocal: theta,
                        delta,
                    })
                    .ok()
                }),
        ) {
            // The initial state's own block is empty, so the first step is flat.
            let initial = AblaState::initial(&config, 0);
            let mut s = initial.next_block_state(&config, initial.next_block_size_limit(&config));
            let mut prev = s.block_size_limit();
            for _ in 0..64 {
                s = s.next_block_state(&config, s.next_block_size_limit(&config));
                prop_assert!(s.block_size_limit() > prev);
                prev = s.block_size_limit();
            }
        }

        #[test]
        fn proptest_lookahead_monotonic_in_count(count in 0usize..256) {
            let config = default_config();
            let state = AblaState::initial(&config, 0);
            let a = state.calc_lookahead_block_size_limit(&config, count);
            let b = state.calc_lookahead_block_size_limit(&config, count + 1);
            prop_assert!(b >= a);
        }
    }
}
