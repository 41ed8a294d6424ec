//! Keyframe playback.
//!
//! Two kinds of animation are supported:
//!
//! - [`PropertyAnimation`] is a float track on a node's z rotation, keyed by
//!   frame number and played by an [`Animatable`].
//! - [`AnimationGroup`] is an imported clip: translation, rotation and scale
//!   channels on many nodes, keyed by time in seconds.

use cgmath::{InnerSpace, Quaternion, VectorSpace};

use crate::{
    data_structures::scene_graph::{NodeId, SceneGraph},
    error::SceneError,
    resources::animation::Keyframes,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloatKey {
    pub frame: f32,
    pub value: f32,
}

/// A named z rotation track with linear interpolation between keys.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyAnimation {
    pub name: String,
    pub frame_rate: f32,
    keys: Vec<FloatKey>,
}

impl PropertyAnimation {
    pub fn new(name: impl Into<String>, frame_rate: f32) -> Self {
        Self {
            name: name.into(),
            frame_rate,
            keys: vec![],
        }
    }

    pub fn set_keys(&mut self, mut keys: Vec<FloatKey>) {
        keys.sort_by(|a, b| a.frame.total_cmp(&b.frame));
        self.keys = keys;
    }

    pub fn keys(&self) -> &[FloatKey] {
        &self.keys
    }

    /// Interpolated value at `frame`, clamped to the first and last key.
    pub fn value_at(&self, frame: f32) -> Option<f32> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if frame <= first.frame {
            return Some(first.value);
        }
        if frame >= last.frame {
            return Some(last.value);
        }
        let next = self.keys.partition_point(|key| key.frame <= frame);
        let (a, b) = (self.keys[next - 1], self.keys[next]);
        let t = (frame - a.frame) / (b.frame - a.frame);
        Some(a.value + (b.value - a.value) * t)
    }
}

/// Plays property animations on one node between two frames.
#[derive(Clone, Debug)]
pub struct Animatable {
    pub target: NodeId,
    animations: Vec<PropertyAnimation>,
    from: f32,
    to: f32,
    looping: bool,
    speed: f32,
    elapsed: f32,
}

impl Animatable {
    pub fn begin(
        target: NodeId,
        animations: Vec<PropertyAnimation>,
        from: f32,
        to: f32,
        looping: bool,
    ) -> Self {
        Self {
            target,
            animations,
            from,
            to,
            looping,
            speed: 1.0,
            elapsed: 0.0,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.elapsed += dt * self.speed;
    }

    /// Frame of `animation` after the elapsed time, wrapped into `from..to`
    /// when looping.
    fn frame_of(&self, animation: &PropertyAnimation) -> f32 {
        let span = self.to - self.from;
        let progressed = self.elapsed * animation.frame_rate;
        if span <= 0.0 {
            return self.from;
        }
        if self.looping {
            self.from + progressed.rem_euclid(span)
        } else {
            self.from + progressed.min(span)
        }
    }

    pub fn apply(&self, scene: &mut SceneGraph) -> Result<(), SceneError> {
        let mut euler = scene.rotation_euler(self.target)?;
        for animation in &self.animations {
            let Some(value) = animation.value_at(self.frame_of(animation)) else {
                continue;
            };
            euler.z = value;
        }
        scene.set_rotation_euler(self.target, euler)
    }
}

/// One imported channel: keyframe times in seconds and the values at them.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeChannel {
    pub target: NodeId,
    pub times: Vec<f32>,
    pub values: Keyframes,
}

impl NodeChannel {
    /// Index of the key at or before `time` and the blend factor towards the next key.
    fn segment(&self, time: f32) -> Option<(usize, usize, f32)> {
        let count = self.times.len().min(self.values.len());
        if count == 0 {
            return None;
        }
        let next = self.times[..count].partition_point(|&t| t <= time);
        if next == 0 {
            return Some((0, 0, 0.0));
        }
        if next >= count {
            return Some((count - 1, count - 1, 0.0));
        }
        let (t0, t1) = (self.times[next - 1], self.times[next]);
        let blend = if t1 > t0 { (time - t0) / (t1 - t0) } else { 0.0 };
        Some((next - 1, next, blend))
    }

    fn apply(&self, scene: &mut SceneGraph, time: f32) -> Result<(), SceneError> {
        let Some((a, b, t)) = self.segment(time) else {
            return Ok(());
        };
        let local = &mut scene.node_mut(self.target)?.local;
        match &self.values {
            Keyframes::Translation(values) => local.position = values[a].lerp(values[b], t),
            Keyframes::Scale(values) => local.scale = values[a].lerp(values[b], t),
            Keyframes::Rotation(values) => local.rotation = slerp_shortest(values[a], values[b], t),
        }
        Ok(())
    }
}

fn slerp_shortest(a: Quaternion<f32>, b: Quaternion<f32>, t: f32) -> Quaternion<f32> {
    let b = if a.dot(b) < 0.0 { -b } else { b };
    if a.dot(b) > 0.9995 {
        // nearly parallel, slerp would divide by ~0
        return a.nlerp(b, t);
    }
    a.slerp(b, t).normalize()
}

/// A named clip driving many nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationGroup {
    pub name: String,
    pub channels: Vec<NodeChannel>,
    /// Start of the clip in seconds.
    pub from: f32,
    /// End of the clip in seconds.
    pub to: f32,
    playing: bool,
    looping: bool,
    speed: f32,
    time: f32,
}

impl AnimationGroup {
    pub fn new(name: impl Into<String>, channels: Vec<NodeChannel>) -> Self {
        let from = channels
            .iter()
            .filter_map(|c| c.times.first().copied())
            .fold(f32::INFINITY, f32::min);
        let to = channels
            .iter()
            .filter_map(|c| c.times.last().copied())
            .fold(0.0, f32::max);
        let from = if from.is_finite() { from.min(to) } else { 0.0 };
        Self {
            name: name.into(),
            channels,
            from,
            to,
            playing: false,
            looping: false,
            speed: 1.0,
            time: from,
        }
    }

    pub fn start(&mut self, looping: bool, speed: f32) {
        self.playing = true;
        self.looping = looping;
        self.speed = speed;
        self.time = self.from;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn advance(&mut self, dt: f32) {
        if !self.playing {
            return;
        }
        let span = self.to - self.from;
        self.time += dt * self.speed;
        if span <= 0.0 {
            self.time = self.from;
        } else if self.looping {
            self.time = self.from + (self.time - self.from).rem_euclid(span);
        } else if self.time >= self.to {
            self.time = self.to;
            self.playing = false;
        }
    }

    pub fn apply(&self, scene: &mut SceneGraph) -> Result<(), SceneError> {
        for channel in &self.channels {
            channel.apply(scene, self.time)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_3;

    use cgmath::{Rotation3, Vector3};

    use super::*;

    fn track(base: f32) -> PropertyAnimation {
        let mut animation = PropertyAnimation::new("zRotation", 10.0);
        animation.set_keys(vec![
            FloatKey { frame: 0.0, value: base },
            FloatKey { frame: 50.0, value: base + FRAC_PI_3 },
            FloatKey { frame: 100.0, value: base },
            FloatKey { frame: 150.0, value: base - FRAC_PI_3 },
            FloatKey { frame: 200.0, value: base },
        ]);
        animation
    }

    #[test]
    fn linear_between_keys_and_clamped_outside() {
        let animation = track(0.0);
        assert_eq!(animation.value_at(-5.0), Some(0.0));
        assert!((animation.value_at(25.0).unwrap() - FRAC_PI_3 / 2.0).abs() < 1e-6);
        assert_eq!(animation.value_at(500.0), Some(0.0));
        let empty = PropertyAnimation::new("e", 10.0);
        assert_eq!(empty.value_at(1.0), None);
    }

    #[test]
    fn playback_wraps_when_cycling() {
        let mut scene = SceneGraph::new();
        let card = scene.add_node("card", None);
        let mut player = Animatable::begin(card, vec![track(0.5)], 0.0, 200.0, true);
        // 25 s at 10 fps is frame 250, which wraps to frame 50
        player.advance(25.0);
        player.apply(&mut scene).unwrap();
        let z = scene.rotation_euler(card).unwrap().z;
        assert!((z - (0.5 + FRAC_PI_3)).abs() < 1e-5, "{}", z);
    }

    #[test]
    fn playback_holds_the_last_frame_without_looping() {
        let mut scene = SceneGraph::new();
        let card = scene.add_node("card", None);
        let mut player = Animatable::begin(card, vec![track(0.5)], 0.0, 150.0, false);
        player.advance(25.0);
        player.apply(&mut scene).unwrap();
        let z = scene.rotation_euler(card).unwrap().z;
        assert!((z - (0.5 - FRAC_PI_3)).abs() < 1e-5, "{}", z);
    }

    #[test]
    fn playback_keeps_other_euler_components() {
        let mut scene = SceneGraph::new();
        let card = scene.add_node("card", None);
        scene
            .set_rotation_euler(card, Vector3::new(-1.0, std::f32::consts::PI, 0.0))
            .unwrap();
        let player = Animatable::begin(card, vec![track(0.0)], 0.0, 200.0, true);
        player.apply(&mut scene).unwrap();
        let euler = scene.rotation_euler(card).unwrap();
        assert_eq!((euler.x, euler.y), (-1.0, std::f32::consts::PI));
    }

    #[test]
    fn group_samples_translation_and_rotation() {
        let mut scene = SceneGraph::new();
        let hip = scene.add_node("hip", None);
        let mut group = AnimationGroup::new(
            "Samba",
            vec![
                NodeChannel {
                    target: hip,
                    times: vec![0.0, 2.0],
                    values: Keyframes::Translation(vec![
                        Vector3::new(0.0, 0.0, 0.0),
                        Vector3::new(2.0, 0.0, 0.0),
                    ]),
                },
                NodeChannel {
                    target: hip,
                    times: vec![0.0, 2.0],
                    values: Keyframes::Rotation(vec![
                        Quaternion::from_angle_y(cgmath::Deg(0.0)),
                        Quaternion::from_angle_y(cgmath::Deg(90.0)),
                    ]),
                },
            ],
        );
        assert_eq!((group.from, group.to), (0.0, 2.0));
        group.start(true, 1.0);
        group.advance(1.0);
        group.apply(&mut scene).unwrap();
        let local = scene.node(hip).unwrap().local;
        assert!((local.position.x - 1.0).abs() < 1e-5);
        let expected = Quaternion::from_angle_y(cgmath::Deg(45.0));
        assert!(local.rotation.dot(expected).abs() > 0.9999);

        // loops back to the start
        group.advance(1.5);
        assert!((group.time() - 0.5).abs() < 1e-5);
        assert!(group.is_playing());
    }

    #[test]
    fn group_stops_at_the_end_without_looping() {
        let mut group = AnimationGroup::new(
            "once",
            vec![NodeChannel {
                target: SceneGraph::new().add_node("n", None),
                times: vec![0.0, 1.0],
                values: Keyframes::Scale(vec![Vector3::new(1.0, 1.0, 1.0); 2]),
            }],
        );
        group.start(false, 2.0);
        group.advance(1.0);
        assert_eq!(group.time(), 1.0);
        assert!(!group.is_playing());
    }
}
