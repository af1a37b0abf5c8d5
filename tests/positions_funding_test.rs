use indexer_core::db::init_db;
use indexer_core::db::PositionClose;
use indexer_core::domain::identity::{perpetual_position_uuid, subaccount_uuid};
use indexer_core::domain::{
    FundingIndexUpdate, PositionSide, PositionStatus, PositionUpdate,
};
use indexer_core::engine::financial::get_unsettled_funding;
use indexer_core::{Address, CoreError, Decimal, PerpetualPosition, Repository, TendermintEventId, TimeMs};
use tempfile::TempDir;
use uuid::Uuid;

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

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn event(height: i64, tx: i64, index: i64) -> TendermintEventId {
    TendermintEventId::new(height, tx, index).unwrap()
}

fn subaccount() -> Uuid {
    subaccount_uuid(&Address::new("dydx1n88uc38xhjgxzw9nwre4ep2c8ga4fjxcar6mn7"), 0)
}

fn open_position(perpetual_id: i32, open_event: TendermintEventId) -> PerpetualPosition {
    PerpetualPosition {
        id: perpetual_position_uuid(subaccount(), &open_event),
        subaccount_id: subaccount(),
        perpetual_id,
        side: PositionSide::Long,
        status: PositionStatus::Open,
        size: d("10"),
        max_size: d("10"),
        entry_price: d("20000"),
        exit_price: None,
        sum_open: d("10"),
        sum_close: d("0"),
        settled_funding: d("0"),
        created_at: TimeMs::new(1_674_345_600_000),
        created_at_height: open_event.block_height,
        closed_at: None,
        closed_at_height: None,
        open_event_id: open_event,
        last_event_id: open_event,
    }
}

fn funding(perpetual_id: i32, height: u32, index: &str) -> FundingIndexUpdate {
    FundingIndexUpdate {
        perpetual_id,
        effective_at_height: height,
        funding_index: d(index),
        rate: d("0.0004"),
        oracle_price: d("20000"),
        event_id: event(height as i64, -1, 0),
    }
}

#[tokio::test]
async fn test_position_create_update_close() {
    let (repo, _temp) = setup_repo().await;
    let position = open_position(0, event(10, 0, 0));
    repo.create_perpetual_position(&position, None).await.unwrap();

    let stored = repo
        .find_perpetual_position_by_id(position.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, position);

    let updated = repo
        .update_perpetual_position(
            position.id,
            &PositionUpdate {
                side: PositionSide::Long,
                size: d("15.5"),
                entry_price: d("20100"),
                sum_open: d("15.5"),
                sum_close: d("0"),
                settled_funding: d("-1.25"),
                last_event_id: event(11, 2, 0),
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(updated.size, d("15.5"));
    assert_eq!(updated.max_size, d("15.5"));
    assert_eq!(updated.settled_funding, d("-1.25"));

    let close = PositionClose {
        exit_price: d("21000"),
        closed_at: TimeMs::new(1_674_345_700_000),
        closed_at_height: 12,
        last_event_id: event(12, 0, 3),
    };
    let closed = repo
        .close_perpetual_position(position.id, &close, None)
        .await
        .unwrap();
    assert_eq!(closed.status, PositionStatus::Closed);
    assert!(closed.size.is_zero());
    assert_eq!(closed.max_size, d("15.5"));
    assert_eq!(closed.exit_price, Some(d("21000")));
    assert_eq!(closed.closed_at_height, Some(12));

    let reloaded = repo
        .find_perpetual_position_by_id(position.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded, closed);
    assert!(repo
        .find_open_positions_for_subaccount(subaccount())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_closed_position_is_terminal() {
    let (repo, _temp) = setup_repo().await;
    let position = open_position(0, event(10, 0, 0));
    repo.create_perpetual_position(&position, None).await.unwrap();

    let close = PositionClose {
        exit_price: d("21000"),
        closed_at: TimeMs::new(1_674_345_700_000),
        closed_at_height: 12,
        last_event_id: event(12, 0, 3),
    };
    repo.close_perpetual_position(position.id, &close, None)
        .await
        .unwrap();

    let update = PositionUpdate {
        side: PositionSide::Long,
        size: d("1"),
        entry_price: d("20000"),
        sum_open: d("1"),
        sum_close: d("0"),
        settled_funding: d("0"),
        last_event_id: event(13, 0, 0),
    };
    assert!(matches!(
        repo.update_perpetual_position(position.id, &update, None).await,
        Err(CoreError::Integrity(_))
    ));
    assert!(matches!(
        repo.close_perpetual_position(position.id, &close, None).await,
        Err(CoreError::Integrity(_))
    ));
    assert!(matches!(
        repo.update_perpetual_position(Uuid::nil(), &update, None).await,
        Err(CoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_create_rejects_closed_position() {
    let (repo, _temp) = setup_repo().await;
    let closed = PerpetualPosition {
        status: PositionStatus::Closed,
        size: d("0"),
        ..open_position(0, event(10, 0, 0))
    };
    assert!(matches!(
        repo.create_perpetual_position(&closed, None).await,
        Err(CoreError::Integrity(_))
    ));
}

#[tokio::test]
async fn test_open_positions_ordered_by_perpetual() {
    let (repo, _temp) = setup_repo().await;
    repo.create_perpetual_position(&open_position(1, event(10, 0, 0)), None)
        .await
        .unwrap();
    repo.create_perpetual_position(&open_position(0, event(10, 0, 1)), None)
        .await
        .unwrap();

    let open = repo
        .find_open_positions_for_subaccount(subaccount())
        .await
        .unwrap();
    let perpetuals: Vec<i32> = open.iter().map(|p| p.perpetual_id).collect();
    assert_eq!(perpetuals, vec![0, 1]);
}

#[tokio::test]
async fn test_funding_index_map_at_height() {
    let (repo, _temp) = setup_repo().await;
    repo.insert_funding_index_update(&funding(0, 5, "100"), None)
        .await
        .unwrap();
    repo.insert_funding_index_update(&funding(0, 10, "102.5"), None)
        .await
        .unwrap();
    repo.insert_funding_index_update(&funding(1, 8, "-3"), None)
        .await
        .unwrap();

    let before_any = repo.find_funding_index_map(4).await.unwrap();
    assert!(before_any.is_empty());
    assert!(before_any.get(0).is_zero());

    let at_nine = repo.find_funding_index_map(9).await.unwrap();
    assert_eq!(at_nine.len(), 2);
    assert_eq!(at_nine.get(0), d("100"));
    assert_eq!(at_nine.get(1), d("-3"));

    let at_ten = repo.find_funding_index_map(10).await.unwrap();
    assert_eq!(at_ten.get(0), d("102.5"));

    let duplicate = repo
        .insert_funding_index_update(&funding(0, 10, "999"), None)
        .await
        .unwrap_err();
    assert!(duplicate.is_constraint_violation());

    // Long position of 10 between the two snapshots owes 10 * (100 - 102.5).
    let position = open_position(0, event(5, 0, 0));
    let owed = get_unsettled_funding(&position, &at_ten, &at_nine).unwrap();
    assert_eq!(owed, d("-25"));
}

#[tokio::test]
async fn test_position_and_funding_in_one_transaction() {
    let (repo, _temp) = setup_repo().await;
    let position = open_position(0, event(10, 0, 0));

    let mut tx = repo.begin().await.unwrap();
    repo.create_perpetual_position(&position, Some(&mut tx))
        .await
        .unwrap();
    repo.insert_funding_index_update(&funding(0, 10, "1"), Some(&mut tx))
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    assert!(repo
        .find_perpetual_position_by_id(position.id)
        .await
        .unwrap()
        .is_none());
    assert!(repo.find_funding_index_map(10).await.unwrap().is_empty());
}
