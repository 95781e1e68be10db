//! End-to-end scenarios driving the full engine against the simulated
//! world: scan-to-deconstruction tick traces, pathfinder timeout and
//! no-path handling, stuck recovery, and multi-agent chunk exclusion.

use foreman_core::{Engine, EngineConfig, JobData, NewAgentParams};
use foreman_types::{
    AgentId, AgentScheduling, AttributeValue, BoundingBox, Color, ForceId, ItemYield, JobState,
    PlayerId, Position, SurfaceId,
};
use foreman_world::sim::{SimEntitySpec, SimPathResponse, SimWorld};
use foreman_world::WorldAdapter;

fn force() -> ForceId {
    ForceId::new(1)
}

fn surface() -> SurfaceId {
    SurfaceId::new(1)
}

fn area(x1: f64, y1: f64, x2: f64, y2: f64) -> BoundingBox {
    BoundingBox::new(Position::new(x1, y1), Position::new(x2, y2))
}

fn make_world() -> SimWorld {
    let mut world = SimWorld::new(surface());
    world.set_prototype_attribute(
        "entity",
        "wooden-chest",
        "mining_time",
        AttributeValue::Number(1.0),
    );
    world.set_prototype_attribute(
        "entity",
        "wooden-chest",
        "mineable_products",
        AttributeValue::Products(vec![ItemYield {
            name: "wooden-chest".to_owned(),
            amount: 1,
            probability: 1.0,
        }]),
    );
    world
}

fn add_marked_chest(world: &mut SimWorld, unit: u64, x: f64, y: f64) {
    let chest = world.add_entity(
        SimEntitySpec::new("wooden-chest", "container", Position::new(x, y), force())
            .with_unit_number(unit),
    );
    world.mark_for_deconstruction(chest, force());
}

fn add_agent(world: &mut SimWorld, engine: &mut Engine, name: &str, x: f64, y: f64) -> AgentId {
    let entity = world.add_entity(SimEntitySpec::new(
        "robot",
        "character",
        Position::new(x, y),
        force(),
    ));
    engine
        .create_agent(
            world,
            NewAgentParams {
                entity,
                master: PlayerId::new(1),
                force: force(),
                name: name.to_owned(),
                color: Color::WHITE,
            },
        )
        .unwrap_or_else(|err| panic!("agent creation failed: {err}"))
}

/// One engine tick followed by one world tick, delivering any pathfinder
/// completions the way the host would.
fn step(engine: &mut Engine, world: &mut SimWorld) {
    engine
        .run_tick(world)
        .unwrap_or_else(|err| panic!("tick failed: {err}"));
    for event in world.advance_tick() {
        engine.on_path_request_finished(&event);
    }
}

fn run_until_idle(engine: &mut Engine, world: &mut SimWorld, agents: &[AgentId], limit: u32) {
    for _ in 0..limit {
        let all_idle = agents.iter().all(|agent| {
            engine
                .agents
                .agent(*agent)
                .map(|record| record.jobs.is_empty())
                .unwrap_or(true)
        });
        if all_idle {
            return;
        }
        step(engine, world);
    }
    panic!("agents did not finish within {limit} ticks");
}

#[test]
fn s1_single_adjacent_entity_tick_trace() {
    let mut world = make_world();
    let mut engine = Engine::new(EngineConfig::default());
    add_marked_chest(&mut world, 1, 0.5, 0.5);
    let agent = add_agent(&mut world, &mut engine, "Unit 1", 0.0, 0.0);
    let job = engine.create_job(
        PlayerId::new(1),
        JobData::CompleteArea {
            surface: surface(),
            areas: vec![area(-1.0, -1.0, 1.0, 1.0)],
            force: force(),
        },
    );
    assert!(engine.assign_job(agent, job).is_ok());

    // Tick 0: raw collection. Tick 1: dedup. Tick 2: resolve.
    for tick in 0..3 {
        assert_eq!(world.current_tick(), tick);
        step(&mut engine, &mut world);
        assert!(world.mined_entities().is_empty());
    }

    // Tick 3: the chunk is assigned and the entity mined; the agent sleeps
    // 30 + ceil(1.0 * 60 / 1.0) = 90 ticks.
    assert_eq!(world.current_tick(), 3);
    step(&mut engine, &mut world);
    assert_eq!(world.mined_entities().len(), 1);
    let record = engine.agents.agent(agent).ok();
    assert!(record.is_some_and(|r| r.busy_until_tick == 93 && r.jobs.is_empty()));
    assert!(engine.jobs.job(job).is_ok_and(|j| j.state == JobState::Completed));
    assert!(world
        .live_text_contents()
        .contains(&"Deconstruction completed".to_owned()));

    // The agent sleeps through tick 92 and goes idle at 93.
    while world.current_tick() < 93 {
        step(&mut engine, &mut world);
    }
    assert_eq!(world.current_tick(), 93);
    step(&mut engine, &mut world);
    assert!(world.live_text_contents().contains(&"Idle".to_owned()));
}

#[test]
fn s2_overlapping_rectangles_mine_the_shared_entity_once() {
    let mut world = make_world();
    let mut engine = Engine::new(EngineConfig::default());
    add_marked_chest(&mut world, 1, 3.0, 3.0);
    let agent = add_agent(&mut world, &mut engine, "Unit 1", 3.0, 2.0);
    let job = engine.create_job(
        PlayerId::new(1),
        JobData::CompleteArea {
            surface: surface(),
            areas: vec![area(0.0, 0.0, 4.0, 4.0), area(2.0, 2.0, 6.0, 6.0)],
            force: force(),
        },
    );
    assert!(engine.assign_job(agent, job).is_ok());

    run_until_idle(&mut engine, &mut world, &[agent], 200);
    assert_eq!(world.mined_entities().len(), 1);
}

#[test]
fn s3_pathfinder_timeout_then_success() {
    let mut world = make_world();
    world.set_walking_speed(1.0);
    world.script_path_response(SimPathResponse::TryAgainLater);
    let mut engine = Engine::new(EngineConfig::default());
    let agent = add_agent(&mut world, &mut engine, "Unit 1", 0.0, 0.0);
    let job = engine.create_job(
        PlayerId::new(1),
        JobData::WalkToLocation {
            surface: surface(),
            target: Position::new(20.0, 20.0),
            closeness: 1.0,
        },
    );
    assert!(engine.assign_job(agent, job).is_ok());

    // Tick 0 submits the first request; the world answers try-again-later.
    step(&mut engine, &mut world);
    assert_eq!(world.path_requests_submitted(), 1);

    // Tick 1 observes the timeout and backs off 60 ticks.
    step(&mut engine, &mut world);
    let record = engine.agents.agent(agent).ok();
    assert!(record.is_some_and(|r| r.busy_until_tick == 61));

    while world.current_tick() < 61 {
        step(&mut engine, &mut world);
        assert_eq!(world.path_requests_submitted(), 1);
    }

    // Tick 61: the second request goes out; this one succeeds.
    step(&mut engine, &mut world);
    assert_eq!(world.path_requests_submitted(), 2);

    run_until_idle(&mut engine, &mut world, &[agent], 300);
    let position = world
        .entity_position(
            engine
                .agents
                .agent(agent)
                .map(|r| r.entity)
                .unwrap_or_else(|err| panic!("agent missing: {err}")),
        )
        .unwrap_or_else(|err| panic!("entity missing: {err}"));
    assert!((position.x - 20.0).abs() < 1.0 && (position.y - 20.0).abs() < 1.0);
}

#[test]
fn s4_stuck_recovery_replans_and_arrives() {
    let mut world = make_world();
    world.set_walking_speed(1.0);
    let mut engine = Engine::new(EngineConfig::default());
    let agent = add_agent(&mut world, &mut engine, "Unit 1", 0.0, 0.0);
    let job = engine.create_job(
        PlayerId::new(1),
        JobData::WalkToLocation {
            surface: surface(),
            target: Position::new(20.0, 0.0),
            closeness: 1.0,
        },
    );
    assert!(engine.assign_job(agent, job).is_ok());

    // Tick 0: path request. Tick 1: path found, walking starts.
    step(&mut engine, &mut world);
    step(&mut engine, &mut world);
    let entity = engine
        .agents
        .agent(agent)
        .map(|r| r.entity)
        .unwrap_or_else(|err| panic!("agent missing: {err}"));
    assert!(world.walking_command(entity).is_some());

    // Freeze the world's movement: the next walk call records the current
    // position, and the one after observes it unchanged, tears the walk
    // branch, and issues a fresh path request within the same tick.
    world.set_walking_speed(0.0);
    step(&mut engine, &mut world);
    assert_eq!(world.path_requests_submitted(), 1);
    step(&mut engine, &mut world);
    assert_eq!(world.path_requests_submitted(), 2);

    world.set_walking_speed(1.0);
    run_until_idle(&mut engine, &mut world, &[agent], 300);
    let position = world
        .entity_position(entity)
        .unwrap_or_else(|err| panic!("entity missing: {err}"));
    assert!((position.x - 20.0).abs() < 1.0 && position.y.abs() < 1.0);
}

#[test]
fn s5_two_agents_split_four_chunks() {
    let mut world = make_world();
    world.set_walking_speed(1.0);
    let mut config = EngineConfig::default();
    config.settings.debug.fast_deconstruct = true;
    let mut engine = Engine::new(config);

    add_marked_chest(&mut world, 1, 16.0, 16.0);
    add_marked_chest(&mut world, 2, 48.0, 16.0);
    add_marked_chest(&mut world, 3, 16.0, 48.0);
    add_marked_chest(&mut world, 4, 48.0, 48.0);

    let first = add_agent(&mut world, &mut engine, "Unit 1", 16.0, 15.0);
    let second = add_agent(&mut world, &mut engine, "Unit 2", 48.0, 15.0);
    let job = engine.create_job(
        PlayerId::new(1),
        JobData::CompleteArea {
            surface: surface(),
            areas: vec![area(0.0, 0.0, 64.0, 64.0)],
            force: force(),
        },
    );
    assert!(engine.assign_job(first, job).is_ok());
    assert!(engine.assign_job(second, job).is_ok());

    run_until_idle(&mut engine, &mut world, &[first, second], 1500);

    assert_eq!(world.mined_entities().len(), 4);
    assert!(engine.jobs.job(job).is_ok_and(|j| j.state == JobState::Completed));
    assert!(engine.jobs.job(job).is_ok_and(|j| j.agents.is_empty()));
    // Both robots were left without walking commands after the tree came
    // down.
    for agent in [first, second] {
        let entity = engine
            .agents
            .agent(agent)
            .map(|r| r.entity)
            .unwrap_or_else(|err| panic!("agent missing: {err}"));
        assert!(world.walking_command(entity).is_none());
    }
}

#[test]
fn s6_no_path_at_primary_root_parks_the_agent() {
    let mut world = make_world();
    world.script_path_response(SimPathResponse::NoPath);
    let mut engine = Engine::new(EngineConfig::default());
    let agent = add_agent(&mut world, &mut engine, "Unit 1", 0.0, 0.0);
    let job = engine.create_job(
        PlayerId::new(1),
        JobData::WalkToLocation {
            surface: surface(),
            target: Position::new(500.0, 500.0),
            closeness: 1.0,
        },
    );
    assert!(engine.assign_job(agent, job).is_ok());

    step(&mut engine, &mut world);
    step(&mut engine, &mut world);

    let record = engine.agents.agent(agent).ok();
    assert!(record.is_some_and(|r| {
        r.scheduling == AgentScheduling::Standby && r.jobs.is_empty()
    }));
    let entity = engine
        .agents
        .agent(agent)
        .map(|r| r.entity)
        .unwrap_or_else(|err| panic!("agent missing: {err}"));
    assert!(world.walking_command(entity).is_none());
    // The job stays alive without the agent.
    assert!(engine
        .jobs
        .job(job)
        .is_ok_and(|j| j.state == JobState::Active && j.agents.is_empty()));
    assert!(engine.tasks.registry().is_empty());
}

#[test]
fn snapshot_mid_scan_restores_and_finishes() {
    let mut world = make_world();
    let mut engine = Engine::new(EngineConfig::default());
    add_marked_chest(&mut world, 1, 0.5, 0.5);
    let agent = add_agent(&mut world, &mut engine, "Unit 1", 0.0, 0.0);
    let job = engine.create_job(
        PlayerId::new(1),
        JobData::CompleteArea {
            surface: surface(),
            areas: vec![area(-1.0, -1.0, 1.0, 1.0)],
            force: force(),
        },
    );
    assert!(engine.assign_job(agent, job).is_ok());

    // Snapshot after the raw-collection tick, mid-scan.
    step(&mut engine, &mut world);
    let json = serde_json::to_string(&engine)
        .unwrap_or_else(|err| panic!("snapshot failed: {err}"));
    drop(engine);

    let mut restored: Engine =
        serde_json::from_str(&json).unwrap_or_else(|err| panic!("restore failed: {err}"));
    run_until_idle(&mut restored, &mut world, &[agent], 200);
    assert_eq!(world.mined_entities().len(), 1);
}
