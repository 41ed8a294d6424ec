use crate::data_structures::{
    animation::{Animatable, FloatKey, PropertyAnimation},
    scene_graph::NodeId,
};

/// Last key of the swing, in frames.
pub const SWING_FRAMES: f32 = 200.0;

/// A swing around z: `base`, `base + amplitude`, `base`, `base - amplitude`,
/// `base`, one key every 50 frames.
pub fn card_rotation_animation(base: f32, frame_rate: f32, amplitude: f32) -> PropertyAnimation {
    let mut animation = PropertyAnimation::new("zRotation", frame_rate);
    let quarter = SWING_FRAMES / 4.0;
    animation.set_keys(vec![
        FloatKey { frame: 0.0, value: base },
        FloatKey { frame: quarter, value: base + amplitude },
        FloatKey { frame: 2.0 * quarter, value: base },
        FloatKey { frame: 3.0 * quarter, value: base - amplitude },
        FloatKey { frame: SWING_FRAMES, value: base },
    ]);
    animation
}

/// Starts the swing on `card`, looping over the whole track.
pub fn begin_card_swing(card: NodeId, animation: PropertyAnimation) -> Animatable {
    Animatable::begin(card, vec![animation], 0.0, SWING_FRAMES, true)
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_3;

    use cgmath::Vector3;

    use super::*;
    use crate::data_structures::scene_graph::SceneGraph;

    #[test]
    fn swing_keys_hit_sixty_degrees() {
        let base = 0.25;
        let animation = card_rotation_animation(base, 10.0, FRAC_PI_3);
        let expected = [base, base + FRAC_PI_3, base, base - FRAC_PI_3, base];
        for (frame, value) in [0.0, 50.0, 100.0, 150.0, 200.0].into_iter().zip(expected) {
            let sampled = animation.value_at(frame).unwrap();
            assert!((sampled - value).abs() < 1e-6, "frame {}: {}", frame, sampled);
        }
        assert!((animation.value_at(25.0).unwrap() - (base + FRAC_PI_3 / 2.0)).abs() < 1e-6);
    }

    #[test]
    fn swing_loops_every_twenty_seconds() {
        let mut scene = SceneGraph::new();
        let card = scene.add_node("baseCard", None);
        scene
            .set_rotation_euler(card, Vector3::new(-1.0, 2.0, 0.0))
            .unwrap();
        let mut swing = begin_card_swing(card, card_rotation_animation(0.0, 10.0, FRAC_PI_3));

        // frame 50
        swing.advance(5.0);
        swing.apply(&mut scene).unwrap();
        let euler = scene.rotation_euler(card).unwrap();
        assert!((euler.z - FRAC_PI_3).abs() < 1e-5);
        assert_eq!((euler.x, euler.y), (-1.0, 2.0));

        // one full loop later, frame 50 again
        swing.advance(20.0);
        swing.apply(&mut scene).unwrap();
        assert!((scene.rotation_euler(card).unwrap().z - FRAC_PI_3).abs() < 1e-4);
    }
}
