//! Integration test: invariants that hold across whole sessions.

use std::collections::HashMap;
use std::fs;

use proptest::prelude::*;
use serde_json::Value;
use tag_arena::arena::{Aabb, ArenaGeometry};
use tag_arena::config::{SessionConfig, VisionConfig};
use tag_arena::link::NullLink;
use tag_arena::types::{Role, Vec3};
use tag_arena::Session;

fn offline(config: SessionConfig) -> Session<NullLink> {
    Session::new(config, NullLink::new()).unwrap()
}

fn training(time_limit_secs: f64) -> SessionConfig {
    SessionConfig {
        time_limit_secs,
        training_mode: true,
        control_all_agents: true,
        ..SessionConfig::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn observation_length_tracks_ray_count(
        rays in 1usize..64,
        fov_degrees in 1.0f64..360.0,
        seed in any::<u64>(),
    ) {
        let config = SessionConfig {
            seed,
            vision: VisionConfig {
                ray_count: rays,
                fov_degrees,
                ..VisionConfig::default()
            },
            ..SessionConfig::default()
        };
        let mut session = offline(config);
        for _ in 0..10 {
            session.step();
            for id in 0..2 {
                let obs = session.observation(id);
                prop_assert_eq!(obs.len(), 12 + 2 * rays);
                for ray in obs.as_slice()[12..].chunks(2) {
                    prop_assert!((0.0..=1.0).contains(&ray[0]));
                    prop_assert!(ray[1] == 0.0 || ray[1] == 1.0);
                }
            }
        }
    }
}

#[test]
fn obstacles_block_vision() {
    // A closed ring of boxes between |x|, |z| = 2 and 4 around the origin.
    let arena = ArenaGeometry::open(15.0).with_obstacles([
        Aabb::centered(3.0, 0.0, 1.0, 3.0),
        Aabb::centered(-3.0, 0.0, 1.0, 3.0),
        Aabb::centered(0.0, 3.0, 3.0, 1.0),
        Aabb::centered(0.0, -3.0, 3.0, 1.0),
    ]);
    let mut session = offline(SessionConfig::default()).with_arena(arena);
    session.start_round();
    session.place_agent(0, Vec3::zero());
    session.place_agent(1, Vec3::on_floor(10.0, 10.0));

    let obs = session.observation(0);
    let range = session.config().vision.max_range;
    for ray in obs.as_slice()[12..].chunks(2) {
        assert!(ray[0] <= 3.0 / range);
        assert_eq!(ray[1], 0.0);
    }

    let mut open = offline(SessionConfig::default());
    open.start_round();
    open.place_agent(0, Vec3::zero());
    open.place_agent(1, Vec3::on_floor(10.0, 10.0));
    let far = open.observation(0);
    assert!(far.as_slice()[12..]
        .chunks(2)
        .any(|ray| ray[0] > 3.0 / range));
}

#[test]
fn every_round_has_one_seeker_and_one_hider() {
    let config = SessionConfig {
        agent_names: vec!["A".into(), "B".into(), "C".into()],
        time_limit_secs: 0.3,
        ..SessionConfig::default()
    };
    let mut session = offline(config);
    for _ in 0..100 {
        session.step();
        let registry = session.registry();
        assert_eq!(registry.count_role(Role::Seeker), 1);
        assert_eq!(registry.count_role(Role::Hider), 1);
        assert_eq!(registry.role(2), None);
    }
}

#[test]
fn only_the_seeker_starts_immune() {
    let mut session = offline(SessionConfig::default());
    session.start_round();
    let now = session.now();
    let seeker = session.episode().seeker();
    let hider = session.episode().hider();
    assert!(session.registry().get(seeker).unwrap().is_immune(now));
    assert!(!session.registry().get(hider).unwrap().is_immune(now));
}

#[test]
fn reset_restores_clock_and_spreads_agents() {
    let mut session = offline(SessionConfig {
        time_limit_secs: 0.2,
        ..SessionConfig::default()
    });
    let rounds = session.run(3, 10_000);
    assert_eq!(rounds.len(), 3);

    session.start_round();
    let episode = session.episode();
    assert!(episode.is_active());
    assert_eq!(episode.time_left(), episode.time_limit());
    assert!(session.pair_distance() >= session.config().min_spawn_separation);
    assert_eq!(session.last_applied(0).move_x, 0.0);
}

#[test]
fn clock_never_runs_backwards() {
    let mut session = offline(SessionConfig {
        time_limit_secs: 0.5,
        ..SessionConfig::default()
    });
    session.step();
    let mut last = session.episode().time_left().value();
    let mut episode = session.episode().episode_index();
    for _ in 0..200 {
        session.step();
        let current = session.episode().episode_index();
        let left = session.episode().time_left().value();
        if current == episode {
            assert!(left <= last);
        }
        assert!(left >= 0.0);
        last = left;
        episode = current;
    }
}

#[test]
fn exactly_one_terminal_transition_per_agent_and_episode() {
    let mut session = offline(training(0.4));
    let mut done: HashMap<(u64, String), usize> = HashMap::new();
    let mut finished = 0;
    while finished < 4 {
        if session.step().is_some() {
            finished += 1;
        }
        for t in session.last_transitions() {
            if t.done {
                *done.entry((t.info.episode, t.info.agent.clone())).or_default() += 1;
            }
        }
    }
    assert_eq!(done.len(), 8);
    assert!(done.values().all(|n| *n == 1));
}

#[test]
fn rewards_respect_the_clip() {
    let config = SessionConfig {
        control_all_agents: false,
        ..training(1.0)
    };
    let clip = config.reward.reward_clip;
    let mut session = offline(config);
    for _ in 0..400 {
        session.step();
        for t in session.last_transitions() {
            assert!(t.reward.is_finite());
            assert!(t.reward.abs() <= clip);
        }
    }
}

#[test]
fn trajectory_files_are_bracketed() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = offline(SessionConfig {
        time_limit_secs: 0.2,
        log_trajectories: true,
        trajectories_dir: dir.path().to_path_buf(),
        ..SessionConfig::default()
    });
    assert_eq!(session.run(2, 10_000).len(), 2);

    let mut files: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    assert_eq!(files.len(), 2);
    assert!(files[0].to_string_lossy().ends_with("_ep00001.jsonl"));

    for file in files {
        let text = fs::read_to_string(&file).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.first().unwrap()["type"], "episode_start");
        assert_eq!(lines.last().unwrap()["type"], "episode_end");
        assert_eq!(lines.last().unwrap()["reason"], "timeout");
        assert!(lines.iter().any(|l| l["type"] == "step"));
    }
}
