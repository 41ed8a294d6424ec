/// Output values of one imported animation channel, one entry per keyframe.
#[derive(Clone, Debug, PartialEq)]
pub enum Keyframes {
    Translation(Vec<cgmath::Vector3<f32>>),
    Rotation(Vec<cgmath::Quaternion<f32>>),
    Scale(Vec<cgmath::Vector3<f32>>),
}

impl Keyframes {
    pub fn len(&self) -> usize {
        match self {
            Keyframes::Translation(values) => values.len(),
            Keyframes::Rotation(values) => values.len(),
            Keyframes::Scale(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
