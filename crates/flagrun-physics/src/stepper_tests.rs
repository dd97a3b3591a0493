use glam::Vec2;

use super::*;
use crate::body::{Body, BodyClass};

fn player(id: i32, x: f32, y: f32) -> Body {
    Body {
        id,
        position: Vec2::new(x, y),
        size: Vec2::splat(10.0),
        solid: true,
        touchable: true,
        class: BodyClass::Player,
    }
}

fn wall(id: i32, x: f32, y: f32, w: f32, h: f32) -> Body {
    Body {
        id,
        position: Vec2::new(x, y),
        size: Vec2::new(w, h),
        solid: true,
        touchable: false,
        class: BodyClass::Other,
    }
}

fn region(id: i32, x: f32, y: f32) -> Body {
    Body {
        id,
        position: Vec2::new(x, y),
        size: Vec2::splat(20.0),
        solid: false,
        touchable: true,
        class: BodyClass::Other,
    }
}

#[test]
fn test_zero_velocity_returns_input() {
    let stepper = MovementStepper::default();
    let mover = player(1, 4.5, -7.25);
    // Overlapping a wall must not matter when nothing moves.
    let others = [wall(2, 4.5, -7.25, 50.0, 50.0)];
    for elapsed in [0.0, 1.0, 16.0, 10_000.0] {
        let pos = stepper.simulate(&mover, mover.position, Vec2::ZERO, elapsed, &others);
        assert_eq!(pos, mover.position);
    }
}

#[test]
fn test_free_movement_scales_with_time() {
    let stepper = MovementStepper::default();
    let mover = player(1, 0.0, 0.0);
    let pos = stepper.simulate(&mover, Vec2::ZERO, Vec2::new(5.0, 0.0), 30.0, &[]);
    assert_eq!(pos, Vec2::new(10.0, 0.0));

    let pos = stepper.simulate(&mover, Vec2::ZERO, Vec2::new(0.0, -3.0), 15.0, &[]);
    assert_eq!(pos, Vec2::new(0.0, -3.0));
}

#[test]
fn test_wall_stops_before_contact() {
    let stepper = MovementStepper::default();
    let mover = player(1, 0.0, 0.0);
    let others = [wall(2, 50.0, 0.0, 10.0, 10.0)];
    let pos = stepper.simulate(&mover, Vec2::ZERO, Vec2::new(100.0, 0.0), 15.0, &others);
    assert_eq!(pos, Vec2::new(39.0, 0.0));
}

#[test]
fn test_blocked_axis_slides_along_wall() {
    let stepper = MovementStepper::default();
    let mover = player(1, 39.0, 0.0);
    // Tall wall to the right; moving diagonally keeps the Y component.
    let others = [wall(2, 50.0, 0.0, 10.0, 1000.0)];
    let pos = stepper.simulate(&mover, mover.position, Vec2::new(3.0, 3.0), 60.0, &others);
    assert_eq!(pos, Vec2::new(39.0, 12.0));
}

#[test]
fn test_both_axes_blocked_returns_immediately() {
    let stepper = MovementStepper::default();
    let mover = player(1, 0.0, 0.0);
    let others = [
        wall(2, 11.0, 0.0, 10.0, 100.0),
        wall(3, 0.0, 11.0, 100.0, 10.0),
    ];
    let pos = stepper.simulate(&mover, Vec2::ZERO, Vec2::new(2.0, 2.0), 150.0, &others);
    assert_eq!(pos, Vec2::ZERO);
}

#[test]
fn test_players_pass_through_players() {
    let stepper = MovementStepper::default();
    let mover = player(1, 0.0, 0.0);
    let others = [player(2, 20.0, 0.0)];
    let mut touches = Vec::new();
    let pos = stepper.simulate_with_touches(
        &mover,
        Vec2::ZERO,
        Vec2::new(40.0, 0.0),
        15.0,
        &others,
        &mut touches,
    );
    assert_eq!(pos, Vec2::new(40.0, 0.0));
    assert!(touches.iter().all(|t| *t == Touch { mover: 1, other: 2 }));
    assert!(!touches.is_empty());
}

#[test]
fn test_touch_recorded_once_per_sub_step() {
    let stepper = MovementStepper::default();
    let mover = player(1, 0.0, 0.0);
    // Region spans x in [-10, 10]; mover starts inside and leaves after a few steps.
    let others = [region(5, 0.0, 0.0)];
    let mut touches = Vec::new();
    let pos = stepper.simulate_with_touches(
        &mover,
        Vec2::ZERO,
        Vec2::new(30.0, 0.0),
        15.0,
        &others,
        &mut touches,
    );
    assert_eq!(pos, Vec2::new(30.0, 0.0));
    // Either probe overlaps while within 15 units of the centre: six sub-steps.
    assert_eq!(touches.len(), 6);
}

#[test]
fn test_plain_simulate_records_nothing_and_ignores_self() {
    let stepper = MovementStepper::default();
    let mover = player(1, 0.0, 0.0);
    let others = [mover, region(5, 0.0, 0.0)];
    let pos = stepper.simulate(&mover, Vec2::ZERO, Vec2::new(6.0, 0.0), 15.0, &others);
    assert_eq!(pos, Vec2::new(6.0, 0.0));
}

#[test]
fn test_same_inputs_same_output() {
    let stepper = MovementStepper::default();
    let mover = player(1, 3.3, -1.7);
    let others = [wall(2, 40.0, 10.0, 12.0, 30.0), wall(3, -25.0, 0.0, 8.0, 8.0)];
    let velocity = Vec2::new(4.7, 1.3);
    let a = stepper.simulate(&mover, mover.position, velocity, 123.0, &others);
    let b = stepper.simulate(&mover, mover.position, velocity, 123.0, &others);
    assert_eq!(a, b);
}

#[test]
fn test_non_finite_velocity_is_ignored() {
    let stepper = MovementStepper::default();
    let mover = player(1, 1.0, 2.0);
    let pos = stepper.simulate(&mover, mover.position, Vec2::new(f32::NAN, 0.0), 15.0, &[]);
    assert_eq!(pos, mover.position);
}

#[test]
fn test_large_elapsed_finishes() {
    let stepper = MovementStepper::default();
    let mover = player(1, 0.0, 0.0);
    let pos = stepper.simulate(&mover, Vec2::ZERO, Vec2::new(5.0, 0.0), 3.0e8, &[]);
    assert!(pos.is_finite());
    assert!(pos.x > 1.0e6, "moved to {pos}");
    assert_eq!(pos.y, 0.0);

    let others = [wall(2, 500.0, -50.0, 10.0, 100.0)];
    let pos = stepper.simulate(&mover, Vec2::ZERO, Vec2::new(5.0, 0.0), 3.0e6, &others);
    assert!(pos.x < 490.0, "passed the wall at {pos}");
}
