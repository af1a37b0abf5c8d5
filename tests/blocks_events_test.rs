use indexer_core::db::{init_db, BlockRange};
use indexer_core::domain::event::{compare, sort_encoded_ids};
use indexer_core::domain::{Block, EventSource};
use indexer_core::{Repository, TendermintEventId, TimeMs};
use proptest::prelude::*;
use tempfile::TempDir;

async fn setup_repo() -> (Repository, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    (Repository::new(pool), temp_dir)
}

fn block(height: u32, time_ms: i64) -> Block {
    Block {
        block_height: height,
        time: TimeMs::new(time_ms),
    }
}

#[tokio::test]
async fn test_block_queries() {
    let (repo, _temp) = setup_repo().await;
    assert!(repo.find_latest_block().await.unwrap().is_none());

    for (height, time) in [(1, 1_000), (2, 2_000), (3, 3_000), (4, 4_000)] {
        repo.create_block(&block(height, time), None).await.unwrap();
    }

    assert_eq!(
        repo.find_block_by_height(2).await.unwrap(),
        Some(block(2, 2_000))
    );
    assert!(repo.find_block_by_height(9).await.unwrap().is_none());
    assert_eq!(
        repo.find_latest_block().await.unwrap(),
        Some(block(4, 4_000))
    );

    assert_eq!(
        repo.find_block_height_at_or_before_time(TimeMs::new(2_500))
            .await
            .unwrap(),
        Some(block(2, 2_000))
    );
    assert_eq!(
        repo.find_block_height_at_or_before_time(TimeMs::new(3_000))
            .await
            .unwrap(),
        Some(block(3, 3_000))
    );
    assert!(repo
        .find_block_height_at_or_before_time(TimeMs::new(999))
        .await
        .unwrap()
        .is_none());

    assert_eq!(
        repo.find_block_range_for_time_range(TimeMs::new(1_500), TimeMs::new(4_000))
            .await
            .unwrap(),
        Some(BlockRange {
            from_height: 2,
            to_height: 4
        })
    );
    assert!(repo
        .find_block_range_for_time_range(TimeMs::new(5_000), TimeMs::new(6_000))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_duplicate_block_rejected() {
    let (repo, _temp) = setup_repo().await;
    repo.create_block(&block(1, 1_000), None).await.unwrap();
    let err = repo.create_block(&block(1, 1_500), None).await.unwrap_err();
    assert!(err.is_constraint_violation());
}

#[tokio::test]
async fn test_events_come_back_in_chain_order() {
    let (repo, _temp) = setup_repo().await;
    let ids = [
        TendermintEventId::new(11, 0, 0).unwrap(),
        TendermintEventId::from_source(10, EventSource::EndBlock, 0).unwrap(),
        TendermintEventId::new(10, 3, 1).unwrap(),
        TendermintEventId::from_source(10, EventSource::BeginBlock, 2).unwrap(),
        TendermintEventId::new(10, 0, 5).unwrap(),
        TendermintEventId::new(10, 3, 0).unwrap(),
    ];
    for id in &ids {
        repo.create_tendermint_event(id, None).await.unwrap();
    }

    let stored = repo.find_all_tendermint_events().await.unwrap();
    let mut expected = ids.to_vec();
    expected.sort();
    assert_eq!(stored, expected);
    assert_eq!(stored[0].source(), EventSource::BeginBlock);
    assert_eq!(stored[1].source(), EventSource::EndBlock);

    let err = repo
        .create_tendermint_event(&ids[0], None)
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation());
}

fn event_id() -> impl Strategy<Value = TendermintEventId> {
    (0..=u32::MAX as i64, -2..=i32::MAX as i64, 0..=u32::MAX as i64)
        .prop_map(|(h, t, e)| TendermintEventId::new(h, t, e).unwrap())
}

proptest! {
    #[test]
    fn prop_encoded_byte_order_matches_compare(a in event_id(), b in event_id()) {
        let bytes = a.encode().cmp(&b.encode());
        let expected = match compare(&a, &b) {
            -1 => std::cmp::Ordering::Less,
            0 => std::cmp::Ordering::Equal,
            _ => std::cmp::Ordering::Greater,
        };
        prop_assert_eq!(bytes, expected);
    }

    #[test]
    fn prop_decode_inverts_encode(id in event_id()) {
        prop_assert_eq!(TendermintEventId::decode(&id.encode()).unwrap(), id);
    }

    #[test]
    fn prop_sorted_raw_ids_decode_sorted(ids in prop::collection::vec(event_id(), 0..20)) {
        let mut raw: Vec<Vec<u8>> = ids.iter().map(|id| id.encode().to_vec()).collect();
        sort_encoded_ids(&mut raw);
        let decoded: Vec<TendermintEventId> = raw
            .iter()
            .map(|bytes| TendermintEventId::decode(bytes).unwrap())
            .collect();
        let mut expected = ids.clone();
        expected.sort();
        prop_assert_eq!(decoded, expected);
    }
}
