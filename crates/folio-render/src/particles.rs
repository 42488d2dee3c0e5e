use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::host::Size;

/// Half-extent of the cube particles are scattered in.
const FIELD_EXTENT: f32 = 50.0;
const CAMERA_DISTANCE: f32 = 30.0;
const CAMERA_NEAR: f32 = 0.1;
const CAMERA_FOV_DEGREES: f32 = 75.0;
const BASE_SPIN: [f32; 2] = [0.0002, 0.0003];
const POINTER_SPIN: f32 = 0.0002;

/// The simulated particle cloud. Owned by one controller.
#[derive(Debug, Clone)]
pub struct ParticleField {
    positions: Vec<[f32; 3]>,
    rotation: [f32; 2],
    pointer: [f32; 2],
    pointer_target: [f32; 2],
    pointer_tracking: bool,
    smoothing: f32,
}

impl ParticleField {
    /// Scatter `count` particles uniformly in the field cube.
    pub fn generate(count: usize, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let positions = (0..count)
            .map(|_| {
                [
                    (rng.gen::<f32>() - 0.5) * FIELD_EXTENT * 2.0,
                    (rng.gen::<f32>() - 0.5) * FIELD_EXTENT * 2.0,
                    (rng.gen::<f32>() - 0.5) * FIELD_EXTENT * 2.0,
                ]
            })
            .collect();

        Self {
            positions,
            rotation: [0.0, 0.0],
            pointer: [0.0, 0.0],
            pointer_target: [0.0, 0.0],
            pointer_tracking: true,
            smoothing: 0.05,
        }
    }

    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing.clamp(0.0, 1.0) as f32;
        self
    }

    pub fn with_pointer_tracking(mut self, enabled: bool) -> Self {
        self.pointer_tracking = enabled;
        self
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn rotation(&self) -> [f32; 2] {
        self.rotation
    }

    pub fn pointer(&self) -> [f32; 2] {
        self.pointer
    }

    /// Set where the pointer-following offset drifts towards (−1..1 per axis).
    pub fn set_pointer_target(&mut self, x: f32, y: f32) {
        if self.pointer_tracking {
            self.pointer_target = [x.clamp(-1.0, 1.0), y.clamp(-1.0, 1.0)];
        }
    }

    /// Step the simulation by one rendered frame.
    pub fn advance(&mut self) {
        for axis in 0..2 {
            self.pointer[axis] += (self.pointer_target[axis] - self.pointer[axis]) * self.smoothing;
        }

        self.rotation[0] += BASE_SPIN[0];
        self.rotation[1] += BASE_SPIN[1];
        if self.pointer_tracking {
            // Pointer y tilts around the x axis and vice versa.
            self.rotation[0] += self.pointer[1] * POINTER_SPIN;
            self.rotation[1] += self.pointer[0] * POINTER_SPIN;
        }
    }

    /// Drop particles beyond `count`.
    pub fn truncate(&mut self, count: usize) {
        self.positions.truncate(count);
        self.positions.shrink_to_fit();
    }

    /// Free the particle buffer.
    pub fn clear(&mut self) {
        self.positions = Vec::new();
    }

    pub fn scene(&self) -> ParticleScene<'_> {
        ParticleScene {
            positions: &self.positions,
            rotation: self.rotation,
            point_size: 0.12,
            color: [0x63, 0x66, 0xf1],
            opacity: 0.7,
        }
    }
}

/// Read-only view of a field handed to a surface for one frame.
#[derive(Debug, Clone, Copy)]
pub struct ParticleScene<'a> {
    pub positions: &'a [[f32; 3]],
    /// Rotation around the x and y axes, radians.
    pub rotation: [f32; 2],
    pub point_size: f32,
    pub color: [u8; 3],
    pub opacity: f32,
}

impl<'a> ParticleScene<'a> {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Perspective-project every visible particle onto a surface of `size`.
    ///
    /// Yields `(x, y, scale)` in pixels, where `scale` is the perspective
    /// factor a host can multiply its point size by.
    pub fn projected(&self, size: Size) -> impl Iterator<Item = (f32, f32, f32)> + 'a {
        let (sin_x, cos_x) = self.rotation[0].sin_cos();
        let (sin_y, cos_y) = self.rotation[1].sin_cos();
        let focal = 1.0 / (CAMERA_FOV_DEGREES.to_radians() / 2.0).tan();
        let aspect = size.aspect() as f32;
        let (width, height) = (size.width as f32, size.height as f32);
        let positions: &'a [[f32; 3]] = self.positions;

        positions.iter().filter_map(move |&[x, y, z]| {
            let (y1, z1) = (y * cos_x - z * sin_x, y * sin_x + z * cos_x);
            let (x2, z2) = (x * cos_y + z1 * sin_y, -x * sin_y + z1 * cos_y);

            let depth = CAMERA_DISTANCE - z2;
            if depth <= CAMERA_NEAR {
                return None;
            }
            let ndc_x = x2 * focal / aspect / depth;
            let ndc_y = y1 * focal / depth;
            if ndc_x.abs() > 1.0 || ndc_y.abs() > 1.0 {
                return None;
            }
            Some((
                (ndc_x + 1.0) * 0.5 * width,
                (1.0 - ndc_y) * 0.5 * height,
                focal / depth,
            ))
        })
    }
}
