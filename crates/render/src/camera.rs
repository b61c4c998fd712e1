use glam::{Mat4, Vec3};

/// World up axis used for every view matrix.
const UP: Vec3 = Vec3::Y;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CameraError {
    /// The look vector is zero, non-finite, or parallel to the up axis.
    #[error("degenerate look vector {0}: must be finite, non-zero and not parallel to +Y")]
    DegenerateLook(Vec3),
}

/// Camera defined by an eye position and a look direction.
///
/// The view matrix is recomputed on every mutation, so `view_matrix()` is
/// always `look_at(position, position + look, +Y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    position: Vec3,
    look: Vec3,
    view: Mat4,
}

impl Default for Camera {
    /// At the origin, looking five units down -Z.
    fn default() -> Self {
        let position = Vec3::ZERO;
        let look = Vec3::new(0.0, 0.0, -5.0);
        Self {
            position,
            look,
            view: view_matrix(position, look),
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, look: Vec3) -> Result<Self, CameraError> {
        check_look(look)?;
        Ok(Self {
            position,
            look,
            view: view_matrix(position, look),
        })
    }

    pub fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.position = Vec3::new(x, y, z);
        self.view = view_matrix(self.position, self.look);
    }

    /// Rejects degenerate directions and leaves the camera untouched.
    pub fn set_look(&mut self, x: f32, y: f32, z: f32) -> Result<(), CameraError> {
        let look = Vec3::new(x, y, z);
        if let Err(e) = check_look(look) {
            tracing::warn!(?look, "rejected camera look vector");
            return Err(e);
        }
        self.look = look;
        self.view = view_matrix(self.position, self.look);
        Ok(())
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn look(&self) -> Vec3 {
        self.look
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }
}

fn view_matrix(position: Vec3, look: Vec3) -> Mat4 {
    Mat4::look_at_rh(position, position + look, UP)
}

fn check_look(look: Vec3) -> Result<(), CameraError> {
    let len_sq = look.length_squared();
    let degenerate = !look.is_finite()
        || len_sq <= f32::EPSILON
        || look.cross(UP).length_squared() <= f32::EPSILON * len_sq;
    if degenerate {
        Err(CameraError::DegenerateLook(look))
    } else {
        Ok(())
    }
}
