//! Property-based tests for deck ordering and card conservation.

use card_table::{CardId, CardTable, CardTableConfig, ChannelBroadcaster, store::MemoryStore};
use proptest::prelude::*;
use std::sync::Arc;

/// One step applied to a pair of decks
#[derive(Debug, Clone)]
enum Step {
    /// Draw from the left deck into the right one (or the reverse)
    Draw { left_to_right: bool },
    /// Move the cards at these positions of the source deck
    Move { left_to_right: bool, picks: Vec<usize> },
    /// Move everything across
    MoveAll { left_to_right: bool },
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        any::<bool>().prop_map(|left_to_right| Step::Draw { left_to_right }),
        (any::<bool>(), prop::collection::vec(0usize..32, 1..4))
            .prop_map(|(left_to_right, picks)| Step::Move { left_to_right, picks }),
        any::<bool>().prop_map(|left_to_right| Step::MoveAll { left_to_right }),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

fn table() -> CardTable {
    CardTable::new(
        Arc::new(MemoryStore::new()),
        Arc::new(ChannelBroadcaster::new(16)),
        &CardTableConfig::default(),
    )
}

proptest! {
    #[test]
    fn test_draw_order_matches_add_order(values in prop::collection::vec(0u32..78, 0..30)) {
        runtime().block_on(async {
            let table = table();
            let draw = table.decks().init_deck("t", "draw").await.unwrap();
            let hand = table.decks().init_deck("t", "hand").await.unwrap();

            let mut added = Vec::new();
            for value in &values {
                added.push(table.registry().register_loaner(*value).await.unwrap());
            }
            draw.add(&added).await.unwrap();

            let mut drawn = Vec::new();
            while let Some(card) = draw.draw_card(&hand).await.unwrap() {
                drawn.push(card);
            }
            prop_assert_eq!(drawn, added.clone());
            let hand_ids: Vec<CardId> = added.iter().map(|card| card.id).collect();
            prop_assert_eq!(hand.ids().await.unwrap(), hand_ids);
            Ok(())
        })?;
    }

    #[test]
    fn test_cards_conserved_across_moves(
        count in 1usize..20,
        steps in prop::collection::vec(step_strategy(), 1..12),
    ) {
        runtime().block_on(async {
            let table = table();
            let left = table.decks().init_deck("t", "left").await.unwrap();
            let right = table.decks().init_deck("t", "right").await.unwrap();

            let mut all_ids = Vec::new();
            for value in 0..count as u32 {
                let card = table.registry().register_loaner(value).await.unwrap();
                all_ids.push(card.id);
            }
            left.add_ids(&all_ids).await.unwrap();

            for step in steps {
                match step {
                    Step::Draw { left_to_right } => {
                        let (from, to) = if left_to_right { (&left, &right) } else { (&right, &left) };
                        from.draw_card(to).await.unwrap();
                    }
                    Step::Move { left_to_right, picks } => {
                        let (from, to) = if left_to_right { (&left, &right) } else { (&right, &left) };
                        let ids = from.ids().await.unwrap();
                        if ids.is_empty() {
                            continue;
                        }
                        let mut chosen: Vec<CardId> = picks.iter().map(|pick| ids[pick % ids.len()]).collect();
                        chosen.sort_unstable();
                        chosen.dedup();
                        from.move_ids(&chosen, to).await.unwrap();
                    }
                    Step::MoveAll { left_to_right } => {
                        let (from, to) = if left_to_right { (&left, &right) } else { (&right, &left) };
                        from.move_all(to).await.unwrap();
                    }
                }

                let mut held = left.ids().await.unwrap();
                held.extend(right.ids().await.unwrap());
                held.sort_unstable();
                prop_assert_eq!(&held, &all_ids, "Every card is in exactly one deck");
            }
            Ok(())
        })?;
    }
}
