use proptest::prelude::*;

use client::view::{community_jokes, joke_of_the_month};
use client::BoardState;
use shared::types::Joke;

fn joke_strategy() -> impl Strategy<Value = Joke> {
    (any::<bool>(), "[a-z ]{1,12}", proptest::option::of("u[0-9]")).prop_map(
        |(month, content, owner)| Joke {
            id: String::new(),
            content,
            created_at: String::new(),
            user_id: owner,
            is_joke_of_the_month: month,
            username: "Anon".into(),
        },
    )
}

/// Feeds with unique ids, in feed order.
fn feed_strategy() -> impl Strategy<Value = Vec<Joke>> {
    proptest::collection::vec(joke_strategy(), 0..20).prop_map(|mut jokes| {
        for (i, joke) in jokes.iter_mut().enumerate() {
            joke.id = i.to_string();
        }
        jokes
    })
}

proptest! {
    #[test]
    fn month_and_community_partition_the_feed(feed in feed_strategy()) {
        let month = joke_of_the_month(&feed);
        let community = community_jokes(&feed);

        let expected = feed.len() - usize::from(month.is_some());
        prop_assert_eq!(community.len(), expected);

        if let Some(month) = month {
            prop_assert!(month.is_joke_of_the_month);
            prop_assert!(community.iter().all(|j| j.id != month.id));
        } else {
            prop_assert!(feed.iter().all(|j| !j.is_joke_of_the_month));
        }
    }

    #[test]
    fn month_is_first_flagged_in_feed_order(feed in feed_strategy()) {
        let first = feed.iter().position(|j| j.is_joke_of_the_month);
        let month = joke_of_the_month(&feed).map(|j| j.id.clone());
        prop_assert_eq!(month, first.map(|i| i.to_string()));
    }

    #[test]
    fn community_keeps_feed_order(feed in feed_strategy()) {
        let ids: Vec<usize> = community_jokes(&feed)
            .iter()
            .map(|j| j.id.parse().unwrap())
            .collect();
        prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn only_the_latest_feed_load_applies(loads in 1usize..8) {
        let mut state = BoardState::new();
        let generations: Vec<u64> = (0..loads).map(|_| state.begin_feed_load()).collect();

        for (i, generation) in generations.iter().enumerate() {
            let applied = state.feed_loaded(*generation, Vec::new());
            prop_assert_eq!(applied, i == loads - 1);
        }
    }
}
