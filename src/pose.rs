//! Array layouts shared by the pose and EMG stages.
//!
//! * skeleton: `[batch, frames, joints, 3]`
//! * bounding boxes: `[batch, frames, 3]` holding `(center_x, center_y, height)`
//! * weak perspective cameras: `[batch, frames, 3]` holding `(s, tx, ty)`
//! * EMG: `[batch, time, muscles]`

pub(crate) mod constants {
    /// Coordinates per 3D joint.
    pub(crate) const POINT_DIMS: usize = 3;

    /// Coordinates per projected joint.
    pub(crate) const PIXEL_DIMS: usize = 2;

    /// `(s, tx, ty)`
    pub(crate) const CAMERA_PARAMS: usize = 3;

    /// `(center_x, center_y, height)`
    pub(crate) const BBOX_PARAMS: usize = 3;

    /// EMG targets are stored divided by this and rescaled before evaluation.
    pub(crate) const EMG_SCALE: f64 = 100.0;
}
