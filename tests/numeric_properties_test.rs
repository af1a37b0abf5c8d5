use indexer_core::domain::{
    FundingIndexMap, PerpetualMarket, PerpetualMarketStatus, PositionSide, PositionStatus,
};
use indexer_core::engine::financial::{
    get_maintenance_margin_ppm, get_perpetual_positions_with_updated_funding,
    get_total_unsettled_funding,
};
use indexer_core::engine::numeric::{
    decode_serialized_int, encode_serialized_int, human_to_quantums, price_to_subticks,
    quantums_to_human, serialized_quantums_to_abs_human, subticks_to_price,
};
use indexer_core::{Decimal, PerpetualPosition, TendermintEventId, TimeMs};
use proptest::prelude::*;
use rust_decimal_macros::dec;

fn market(atomic_resolution: i32, quantum_conversion_exponent: i32) -> PerpetualMarket {
    PerpetualMarket {
        id: 0,
        clob_pair_id: 0,
        ticker: "BTC-USD".to_string(),
        market_id: 0,
        status: PerpetualMarketStatus::Active,
        atomic_resolution,
        quantum_conversion_exponent,
        subticks_per_tick: 10_000,
        step_base_quantums: 10_000_000,
        liquidity_tier_id: 0,
    }
}

fn position(perpetual_id: i32, side: PositionSide, size: Decimal, status: PositionStatus) -> PerpetualPosition {
    let event = TendermintEventId::new(1, 0, perpetual_id as i64).unwrap();
    PerpetualPosition {
        id: uuid::Uuid::from_u128(perpetual_id as u128),
        subaccount_id: uuid::Uuid::nil(),
        perpetual_id,
        side,
        status,
        size,
        max_size: size,
        entry_price: Decimal::new(dec!(20000)),
        exit_price: None,
        sum_open: size,
        sum_close: Decimal::zero(),
        settled_funding: Decimal::zero(),
        created_at: TimeMs::new(0),
        created_at_height: 1,
        closed_at: None,
        closed_at_height: None,
        open_event_id: event,
        last_event_id: event,
    }
}

#[test]
fn test_known_chain_values() {
    let btc = market(-10, -8);
    assert_eq!(
        subticks_to_price(2_000_000_000, &btc).unwrap(),
        Decimal::new(dec!(200000))
    );
    assert_eq!(
        quantums_to_human(15_000_000_000, -10).unwrap(),
        Decimal::new(dec!(1.5))
    );
    assert_eq!(
        serialized_quantums_to_abs_human(&[0xff, 0x38], -2).unwrap(),
        Decimal::new(dec!(2))
    );
    assert!(price_to_subticks(Decimal::new(dec!(0.00001)), &btc).is_err());
}

#[test]
fn test_funding_across_positions() {
    let latest: FundingIndexMap = [(0, Decimal::new(dec!(10))), (1, Decimal::new(dec!(-2)))]
        .into_iter()
        .collect();
    let last_updated: FundingIndexMap = [(0, Decimal::new(dec!(8)))].into_iter().collect();

    let positions = vec![
        position(0, PositionSide::Long, Decimal::new(dec!(3)), PositionStatus::Open),
        position(1, PositionSide::Short, Decimal::new(dec!(0.5)), PositionStatus::Open),
        position(2, PositionSide::Long, Decimal::zero(), PositionStatus::Closed),
    ];

    // 3 * (8 - 10) + (-0.5) * (0 - (-2))
    let total = get_total_unsettled_funding(&positions, &latest, &last_updated).unwrap();
    assert_eq!(total, Decimal::new(dec!(-7)));

    let with_funding =
        get_perpetual_positions_with_updated_funding(&positions, &latest, &last_updated).unwrap();
    let funding: Vec<Decimal> = with_funding.iter().map(|p| p.unsettled_funding).collect();
    assert_eq!(
        funding,
        vec![
            Decimal::new(dec!(-6)),
            Decimal::new(dec!(-1)),
            Decimal::zero()
        ]
    );
}

proptest! {
    #[test]
    fn prop_subticks_round_trip(
        subticks in -1_000_000_000_000_000i128..1_000_000_000_000_000i128,
        atomic_resolution in -12i32..=-4,
        quantum_conversion_exponent in -10i32..=-4,
    ) {
        let m = market(atomic_resolution, quantum_conversion_exponent);
        let price = subticks_to_price(subticks, &m).unwrap();
        prop_assert_eq!(price_to_subticks(price, &m).unwrap(), subticks);
    }

    #[test]
    fn prop_quantums_round_trip(
        quantums in -1_000_000_000_000_000_000i128..1_000_000_000_000_000_000i128,
        atomic_resolution in -18i32..=2,
    ) {
        let human = quantums_to_human(quantums, atomic_resolution).unwrap();
        prop_assert_eq!(human_to_quantums(human, atomic_resolution).unwrap(), quantums);
    }

    #[test]
    fn prop_serialized_int_is_shortest_twos_complement(value in any::<i128>()) {
        let bytes = encode_serialized_int(value);
        prop_assert!(!bytes.is_empty() && bytes.len() <= 16);
        prop_assert_eq!(decode_serialized_int(&bytes).unwrap(), value);
        if bytes.len() > 1 {
            prop_assert_ne!(decode_serialized_int(&bytes[1..]).unwrap(), value);
        }
    }

    #[test]
    fn prop_maintenance_never_exceeds_initial(initial in any::<u32>(), fraction in 0u32..=1_000_000) {
        prop_assert!(get_maintenance_margin_ppm(initial, fraction) <= initial as u64);
    }
}
