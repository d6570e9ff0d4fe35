//! Camera component and view frustum.

use glam::{Affine3A, Mat4, Vec3, Vec4};

/// Projection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in radians.
        fov: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        zoom: f32,
        near: f32,
        far: f32,
    },
}

/// A camera producing view/projection matrices and a culling frustum.
///
/// Cameras are components: they sit on a scene node and are synchronized from
/// that node's world matrix during the hierarchy update.
#[derive(Debug, Clone)]
pub struct Camera {
    pub projection: Projection,

    pub(crate) projection_matrix: Mat4,
    pub(crate) view_matrix: Mat4,
    pub(crate) projection_view_matrix: Mat4,
    pub(crate) world_position: Vec3,
    pub(crate) frustum: Frustum,
}

impl Camera {
    /// Perspective camera; `fov_degrees` is the vertical field of view.
    #[must_use]
    pub fn new_perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            projection: Projection::Perspective {
                fov: fov_degrees.to_radians(),
                aspect,
                near,
                far,
            },
            projection_matrix: Mat4::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            projection_view_matrix: Mat4::IDENTITY,
            world_position: Vec3::ZERO,
            frustum: Frustum::default(),
        };
        camera.update_projection_matrix();
        camera
    }

    #[must_use]
    pub fn new_orthographic(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let mut camera = Self {
            projection: Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                zoom: 1.0,
                near,
                far,
            },
            projection_matrix: Mat4::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            projection_view_matrix: Mat4::IDENTITY,
            world_position: Vec3::ZERO,
            frustum: Frustum::default(),
        };
        camera.update_projection_matrix();
        camera
    }

    /// Reconfigures to a perspective projection.
    pub fn set_perspective(&mut self, fov_degrees: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Projection::Perspective {
            fov: fov_degrees.to_radians(),
            aspect,
            near,
            far,
        };
        self.update_projection_matrix();
    }

    /// Reconfigures to an orthographic projection.
    pub fn set_orthographic(
        &mut self,
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) {
        self.projection = Projection::Orthographic {
            left,
            right,
            bottom,
            top,
            zoom: 1.0,
            near,
            far,
        };
        self.update_projection_matrix();
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if let Projection::Perspective { aspect: a, .. } = &mut self.projection {
            *a = aspect;
            self.update_projection_matrix();
        }
    }

    /// Rebuilds the projection matrix from the current parameters.
    pub fn update_projection_matrix(&mut self) {
        self.projection_matrix = match self.projection {
            Projection::Perspective {
                fov,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh_gl(fov, aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                zoom,
                near,
                far,
            } => Mat4::orthographic_rh_gl(
                left / zoom,
                right / zoom,
                bottom / zoom,
                top / zoom,
                near,
                far,
            ),
        };
        self.projection_view_matrix = self.projection_matrix * self.view_matrix;
    }

    /// Synchronizes view state from the owning node's world matrix.
    pub(crate) fn update_from_world(&mut self, world: &Affine3A) {
        self.world_position = Vec3::from(world.translation);
        self.view_matrix = Mat4::from(*world).inverse();
        self.projection_view_matrix = self.projection_matrix * self.view_matrix;
    }

    /// Re-extracts the culling frustum from the current combined matrix.
    /// Called by a render task before culling.
    pub fn update_frustum(&mut self) {
        self.frustum = Frustum::from_matrix(self.projection_view_matrix);
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> &Mat4 {
        &self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_view_matrix(&self) -> &Mat4 {
        &self.projection_view_matrix
    }

    #[inline]
    #[must_use]
    pub fn world_position(&self) -> Vec3 {
        self.world_position
    }

    #[inline]
    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }
}

/// Six view-frustum planes: left, right, bottom, top, near, far.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Gribb–Hartmann plane extraction for a GL-range ([-1, 1] NDC depth)
    /// projection-view matrix.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [
            rows[3] + rows[0], // left
            rows[3] - rows[0], // right
            rows[3] + rows[1], // bottom
            rows[3] - rows[1], // top
            rows[3] + rows[2], // near
            rows[3] - rows[2], // far
        ];

        for plane in &mut planes {
            let len = Vec3::new(plane.x, plane.y, plane.z).length();
            if len > 0.0 {
                *plane /= len;
            }
        }

        Self { planes }
    }

    /// Whether a world-space sphere touches the frustum.
    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        for plane in &self.planes {
            let dist = plane.x * center.x + plane.y * center.y + plane.z * center.z + plane.w;
            if dist < -radius {
                return false;
            }
        }
        true
    }
}
