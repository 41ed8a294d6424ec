//! Linear blend skinning on the CPU.
//!
//! Skinned meshes are rewritten every frame from their bind pose. The result
//! is in the space of the skin's anchor node, so any node sharing the skin can
//! render it with its own world transform.

use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector3, Vector4, Zero};

use crate::{
    data_structures::{
        model::{MeshData, ModelVertex},
        scene_graph::{SceneGraph, Skin},
    },
    error::SceneError,
};

/// `anchor⁻¹ · joint world · inverse bind` for every joint of `skin`.
pub fn joint_matrices(scene: &SceneGraph, skin: &Skin) -> Result<Vec<Matrix4<f32>>, SceneError> {
    let anchor = scene
        .node(skin.anchor)?
        .world()
        .invert()
        .unwrap_or_else(Matrix4::identity);
    skin.joints
        .iter()
        .enumerate()
        .map(|(i, &joint)| {
            let inverse_bind = skin
                .inverse_bind
                .get(i)
                .copied()
                .unwrap_or_else(Matrix4::identity);
            Ok(anchor * scene.node(joint)?.world() * inverse_bind)
        })
        .collect()
}

/// Poses the bind-pose vertices of `mesh`. Meshes without weights, and
/// vertices whose weights sum to zero, are returned unchanged.
pub fn skin_vertices(mesh: &MeshData, joints: &[Matrix4<f32>]) -> Vec<ModelVertex> {
    let Some(weights) = &mesh.skin_weights else {
        return mesh.vertices.clone();
    };
    mesh.vertices
        .iter()
        .enumerate()
        .map(|(i, vertex)| {
            let (Some(joint_ids), Some(joint_weights)) = (weights.joints.get(i), weights.weights.get(i))
            else {
                return *vertex;
            };
            let mut blended = Matrix4::zero();
            let mut total = 0.0;
            for (&joint, &weight) in joint_ids.iter().zip(joint_weights) {
                if weight <= 0.0 {
                    continue;
                }
                if let Some(matrix) = joints.get(joint as usize) {
                    blended = blended + *matrix * weight;
                    total += weight;
                }
            }
            if total <= f32::EPSILON {
                return *vertex;
            }
            let blended = blended * (1.0 / total);
            let [x, y, z] = vertex.position;
            let position = blended * Vector4::new(x, y, z, 1.0);
            let [nx, ny, nz] = vertex.normal;
            let normal = (blended * Vector4::new(nx, ny, nz, 0.0)).truncate();
            let normal = if normal.magnitude2() > 0.0 {
                normal.normalize()
            } else {
                Vector3::from(vertex.normal)
            };
            ModelVertex {
                position: position.truncate().into(),
                tex_coords: vertex.tex_coords,
                normal: normal.into(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::model::SkinWeights;

    fn two_vertex_mesh() -> MeshData {
        let mut mesh = MeshData::new(
            "strip",
            vec![
                ModelVertex {
                    position: [0.0, 0.0, 0.0],
                    normal: [0.0, 1.0, 0.0],
                    ..Default::default()
                },
                ModelVertex {
                    position: [0.0, 2.0, 0.0],
                    normal: [0.0, 1.0, 0.0],
                    ..Default::default()
                },
            ],
            vec![],
        );
        mesh.skin_weights = Some(SkinWeights {
            joints: vec![[0, 0, 0, 0], [0, 1, 0, 0]],
            weights: vec![[1.0, 0.0, 0.0, 0.0], [0.5, 0.5, 0.0, 0.0]],
        });
        mesh
    }

    #[test]
    fn joint_matrices_are_relative_to_the_anchor() {
        let mut scene = SceneGraph::new();
        let anchor = scene.add_node("anchor", None);
        scene.set_position(anchor, Vector3::new(10.0, 0.0, 0.0)).unwrap();
        let root = scene.add_node("root", Some(anchor));
        let arm = scene.add_node("arm", Some(root));
        scene.set_position(arm, Vector3::new(0.0, 1.0, 0.0)).unwrap();
        scene.update_world_transform_all();

        let skin = Skin {
            anchor,
            joints: vec![root, arm],
            inverse_bind: vec![
                Matrix4::identity(),
                Matrix4::from_translation(Vector3::new(0.0, -1.0, 0.0)),
            ],
        };
        // in bind pose every joint matrix is the identity
        for matrix in joint_matrices(&scene, &skin).unwrap() {
            assert!((matrix - Matrix4::identity()).x.magnitude() < 1e-5);
            assert!((matrix.w - Vector4::unit_w()).magnitude() < 1e-5);
        }
    }

    #[test]
    fn weights_blend_joint_transforms() {
        let mesh = two_vertex_mesh();
        let joints = [
            Matrix4::identity(),
            Matrix4::from_translation(Vector3::new(2.0, 0.0, 0.0)),
        ];
        let posed = skin_vertices(&mesh, &joints);
        assert_eq!(posed[0].position, [0.0, 0.0, 0.0]);
        assert_eq!(posed[1].position, [1.0, 2.0, 0.0]);
        assert_eq!(posed[1].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn unskinned_meshes_pass_through() {
        let mut mesh = two_vertex_mesh();
        mesh.skin_weights = None;
        let posed = skin_vertices(&mesh, &[Matrix4::from_scale(3.0)]);
        assert_eq!(posed, mesh.vertices);
    }
}
