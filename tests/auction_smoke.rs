//! Two agents bidding against each other on the Swiss network.

mod fixtures;

use std::time::Duration;

use auction_planner::opponent::EstimatorOptions;
use auction_planner::plan::Action;
use auction_planner::{AgentOptions, AuctionAgent, Task};
use fixtures::*;

fn agent_options(seed: u64) -> AgentOptions {
    AgentOptions {
        search: seeded(seed, 40),
        estimator: EstimatorOptions {
            search: seeded(seed + 100, 40),
            ..EstimatorOptions::default()
        },
        ..AgentOptions::default()
    }
}

#[test]
fn test_auction_rounds_split_tasks_between_agents() {
    let geo = swiss_network();
    let mut agents = vec![
        AuctionAgent::new(
            0,
            geo.clone(),
            vec![vehicle(&geo, 0, "Lausanne", 30, 5.0), vehicle(&geo, 1, "Basel", 30, 5.0)],
            agent_options(1),
        )
        .unwrap(),
        AuctionAgent::new(
            1,
            geo.clone(),
            vec![vehicle(&geo, 0, "Zurich", 30, 5.0), vehicle(&geo, 1, "Lugano", 30, 5.0)],
            agent_options(2),
        )
        .unwrap(),
    ];

    let tasks: Vec<Task> = [
        ("Geneve", "Bern", 5),
        ("Zurich", "St-Gallen", 8),
        ("Lugano", "Luzern", 3),
        ("Basel", "Aarau", 6),
        ("Sion", "Lausanne", 4),
        ("Thun", "Biel", 7),
    ]
    .iter()
    .enumerate()
    .map(|(i, (from, to, w))| task(&geo, i as u32, from, to, *w))
    .collect();

    for task in &tasks {
        let bids: Vec<Option<u64>> = agents
            .iter_mut()
            .map(|agent| agent.ask_price(task, Duration::from_millis(300)).unwrap())
            .collect();
        assert!(bids.iter().all(Option::is_some));

        let winner = bids
            .iter()
            .enumerate()
            .filter_map(|(bidder, bid)| bid.map(|b| (bidder, b)))
            .min_by_key(|&(_, b)| b)
            .map(|(bidder, _)| bidder)
            .unwrap();

        for agent in &mut agents {
            agent.auction_result(task, winner, &bids).unwrap();
        }
    }

    let won: usize = agents.iter().map(|a| a.won_tasks().len()).sum();
    assert_eq!(won, tasks.len());

    for agent in &mut agents {
        let expected = agent.won_tasks().len();
        assert_eq!(agent.rival().rounds(), tasks.len());

        let plans = agent.plan(Duration::from_millis(500));
        let delivered = plans
            .iter()
            .flat_map(|p| &p.actions)
            .filter(|a| matches!(a, Action::Deliver(_)))
            .count();
        assert_eq!(delivered, expected);
        assert_eq!(plans.len(), 2);
    }
}
