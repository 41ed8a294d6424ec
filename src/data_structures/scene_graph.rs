//! Scene graph and hierarchical scene organization.
//!
//! Nodes live in an arena owned by [`SceneGraph`] and refer to each other by
//! [`NodeId`]. Meshes, materials and textures are stored next to the nodes and
//! are shared by id, so cloning a subtree copies transforms but not geometry.

use cgmath::{Matrix4, SquareMatrix, Vector3};
use image::RgbaImage;

use crate::{
    data_structures::{
        instance::{Instance, rotation_from_euler},
        model::{MeshData, StandardMaterial},
    },
    error::SceneError,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(usize);

impl MeshId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl MaterialId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl TextureId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Joint binding of a skinned node.
///
/// Joint matrices are taken relative to `anchor`, the node the skin was
/// imported on. Clones keep the same anchor and joints, so they replay the
/// original skeleton's pose at their own world transform.
#[derive(Clone, Debug, PartialEq)]
pub struct Skin {
    pub anchor: NodeId,
    pub joints: Vec<NodeId>,
    pub inverse_bind: Vec<Matrix4<f32>>,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub local: Instance,
    /// Euler angles (radians) the local rotation was built from, if any.
    pub euler: Option<Vector3<f32>>,
    pub mesh: Option<MeshId>,
    pub material: Option<MaterialId>,
    pub skin: Option<Skin>,
    pub visible: bool,
    world: Matrix4<f32>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local: Instance::new(),
            euler: None,
            mesh: None,
            material: None,
            skin: None,
            visible: true,
            world: Matrix4::identity(),
            parent: None,
            children: vec![],
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// World transform as of the last [`SceneGraph::update_world_transform_all`].
    pub fn world(&self) -> Matrix4<f32> {
        self.world
    }

    pub fn world_position(&self) -> Vector3<f32> {
        self.world.w.truncate()
    }
}

#[derive(Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    meshes: Vec<MeshData>,
    materials: Vec<StandardMaterial>,
    textures: Vec<RgbaImage>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = Node::new(name);
        node.parent = parent;
        self.nodes.push(node);
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    pub fn add_mesh_node(
        &mut self,
        name: impl Into<String>,
        mesh: MeshId,
        material: Option<MaterialId>,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = self.add_node(name, parent);
        let node = &mut self.nodes[id.0];
        node.mesh = Some(mesh);
        node.material = material;
        id
    }

    pub fn add_mesh(&mut self, mesh: MeshData) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    pub fn add_material(&mut self, material: StandardMaterial) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    pub fn add_texture(&mut self, image: RgbaImage) -> TextureId {
        self.textures.push(image);
        TextureId(self.textures.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes.get(id.0).ok_or(SceneError::MissingNode(id.0))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(id.0).ok_or(SceneError::MissingNode(id.0))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn mesh(&self, id: MeshId) -> Option<&MeshData> {
        self.meshes.get(id.0)
    }

    pub fn meshes(&self) -> &[MeshData] {
        &self.meshes
    }

    pub fn material(&self, id: MaterialId) -> Option<&StandardMaterial> {
        self.materials.get(id.0)
    }

    pub fn materials(&self) -> &[StandardMaterial] {
        &self.materials
    }

    pub fn texture(&self, id: TextureId) -> Option<&RgbaImage> {
        self.textures.get(id.0)
    }

    pub fn textures(&self) -> impl Iterator<Item = (TextureId, &RgbaImage)> {
        self.textures
            .iter()
            .enumerate()
            .map(|(i, image)| (TextureId(i), image))
    }

    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn set_position(&mut self, id: NodeId, position: Vector3<f32>) -> Result<(), SceneError> {
        self.node_mut(id)?.local.position = position;
        Ok(())
    }

    pub fn set_scale(&mut self, id: NodeId, scale: Vector3<f32>) -> Result<(), SceneError> {
        self.node_mut(id)?.local.scale = scale;
        Ok(())
    }

    /// Sets the local rotation from Euler angles in radians.
    pub fn set_rotation_euler(&mut self, id: NodeId, euler: Vector3<f32>) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        node.euler = Some(euler);
        node.local.rotation = rotation_from_euler(euler);
        Ok(())
    }

    /// Euler angles of a node, zero if it was rotated by quaternion only.
    pub fn rotation_euler(&self, id: NodeId) -> Result<Vector3<f32>, SceneError> {
        Ok(self.node(id)?.euler.unwrap_or(Vector3::new(0.0, 0.0, 0.0)))
    }

    /// Moves `child` under `parent` (or to the root when `None`) without
    /// changing where it appears in the world.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<(), SceneError> {
        self.update_world_transform_all();
        let child_world = self.node(child)?.world;
        let parent_world = match parent {
            Some(parent) => {
                if self.is_ancestor_or_self(child, parent) {
                    return Err(SceneError::CyclicParent {
                        child: child.0,
                        parent: parent.0,
                    });
                }
                self.node(parent)?.world
            }
            None => Matrix4::identity(),
        };
        let local = parent_world
            .invert()
            .map(|inverse| inverse * child_world)
            .unwrap_or(child_world);

        self.detach(child)?;
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(child);
        }
        let node = &mut self.nodes[child.0];
        node.parent = parent;
        node.local = Instance::from_matrix(&local);
        node.euler = None;
        node.world = child_world;
        Ok(())
    }

    fn detach(&mut self, child: NodeId) -> Result<(), SceneError> {
        if let Some(old) = self.node(child)?.parent {
            self.nodes[old.0].children.retain(|&c| c != child);
        }
        self.nodes[child.0].parent = None;
        Ok(())
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes.get(node.0).and_then(|n| n.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    /// First node with the given name, in creation order.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| id)
    }

    /// `root` and everything below it, depth first.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id.0) {
                out.push(id);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// Deep copies the subtree at `root`. The copy of `root` is called `name`
    /// and every copied descendant is called `"{copied parent}.{original}"`,
    /// so names chain down the hierarchy. Meshes, materials and skins are
    /// shared with the originals.
    pub fn clone_subtree(
        &mut self,
        root: NodeId,
        name: &str,
        parent: Option<NodeId>,
    ) -> Result<NodeId, SceneError> {
        let source = self.node(root)?.clone();
        let copy = self.add_node(name, parent);
        {
            let node = &mut self.nodes[copy.0];
            node.local = source.local;
            node.euler = source.euler;
            node.mesh = source.mesh;
            node.material = source.material;
            node.skin = source.skin.clone();
            node.visible = source.visible;
        }
        for child in source.children {
            self.clone_child(child, name, copy)?;
        }
        Ok(copy)
    }

    fn clone_child(&mut self, original: NodeId, prefix: &str, parent: NodeId) -> Result<(), SceneError> {
        let source = self.node(original)?.clone();
        let name = format!("{prefix}.{}", source.name);
        let copy = self.add_node(name.clone(), Some(parent));
        {
            let node = &mut self.nodes[copy.0];
            node.local = source.local;
            node.euler = source.euler;
            node.mesh = source.mesh;
            node.material = source.material;
            node.skin = source.skin.clone();
            node.visible = source.visible;
        }
        for child in source.children {
            self.clone_child(child, &name, copy)?;
        }
        Ok(())
    }

    pub fn update_world_transform_all(&mut self) {
        for root in self.roots() {
            self.update_world_transforms(root, Matrix4::identity());
        }
    }

    fn update_world_transforms(&mut self, root: NodeId, parent_world: Matrix4<f32>) {
        let mut stack = vec![(root, parent_world)];
        while let Some((id, parent_world)) = stack.pop() {
            let node = &mut self.nodes[id.0];
            node.world = parent_world * node.local.to_matrix();
            let world = node.world;
            stack.extend(node.children.iter().map(|&child| (child, world)));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use cgmath::InnerSpace;

    use super::*;
    use crate::data_structures::primitives::create_box;

    fn assert_near(a: Vector3<f32>, b: Vector3<f32>) {
        assert!((a - b).magnitude() < 1e-5, "{:?} != {:?}", a, b);
    }

    #[test]
    fn world_transforms_follow_parents() {
        let mut scene = SceneGraph::new();
        let parent = scene.add_node("parent", None);
        let child = scene.add_node("child", Some(parent));
        scene.set_position(parent, Vector3::new(1.0, 0.0, 0.0)).unwrap();
        scene.set_rotation_euler(parent, Vector3::new(0.0, 0.0, FRAC_PI_2)).unwrap();
        scene.set_position(child, Vector3::new(1.0, 0.0, 0.0)).unwrap();
        scene.update_world_transform_all();
        assert_near(scene.node(child).unwrap().world_position(), Vector3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn reparenting_keeps_world_position() {
        let mut scene = SceneGraph::new();
        let card = scene.add_node("card", None);
        scene.set_rotation_euler(card, Vector3::new(-FRAC_PI_2, 0.0, 0.0)).unwrap();
        scene.set_position(card, Vector3::new(0.0, 2.0, 0.0)).unwrap();
        let girl = scene.add_node("girl", None);
        scene.set_position(girl, Vector3::new(0.0, -1.0, -2.0)).unwrap();
        scene.set_scale(girl, Vector3::new(0.2, 0.2, -0.2)).unwrap();

        scene.set_parent(girl, Some(card)).unwrap();
        scene.update_world_transform_all();

        assert_eq!(scene.node(girl).unwrap().parent(), Some(card));
        assert_eq!(scene.node(card).unwrap().children(), &[girl]);
        assert_near(scene.node(girl).unwrap().world_position(), Vector3::new(0.0, -1.0, -2.0));

        // the child now follows the parent
        scene.set_position(card, Vector3::new(0.0, 3.0, 0.0)).unwrap();
        scene.update_world_transform_all();
        assert_near(scene.node(girl).unwrap().world_position(), Vector3::new(0.0, 0.0, -2.0));
    }

    #[test]
    fn cannot_parent_under_own_descendant() {
        let mut scene = SceneGraph::new();
        let a = scene.add_node("a", None);
        let b = scene.add_node("b", Some(a));
        assert!(scene.set_parent(a, Some(b)).is_err());
        assert_eq!(scene.node(a).unwrap().parent(), None);
    }

    #[test]
    fn clone_prefixes_descendants_and_shares_meshes() {
        let mut scene = SceneGraph::new();
        let mesh = scene.add_mesh(create_box("box", 1.0, 1.0, 1.0));
        let root = scene.add_node("__root__", None);
        let body = scene.add_mesh_node("HVGirl_primitive0", mesh, None, Some(root));
        scene.add_node("hand", Some(body));

        let copy = scene.clone_subtree(root, "blueGirl", None).unwrap();

        assert_eq!(scene.node(copy).unwrap().name, "blueGirl");
        let body_copy = scene.find_by_name("blueGirl.HVGirl_primitive0").unwrap();
        assert_ne!(body_copy, body);
        assert_eq!(scene.node(body_copy).unwrap().mesh, Some(mesh));
        let hand_copy = scene.find_by_name("blueGirl.HVGirl_primitive0.hand").unwrap();
        assert!(scene.descendants(copy).contains(&hand_copy));
        // the original is untouched
        assert_eq!(scene.find_by_name("HVGirl_primitive0"), Some(body));
        assert_eq!(scene.descendants(root).len(), 3);
    }
}
