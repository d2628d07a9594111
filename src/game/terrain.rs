//! Cave terrain: a floor and ceiling height-field sampled at equal x spacing

use rand::Rng;

use super::constants::{
    HEIGHT, MIN_CAVE_HEIGHT, PLAYER_RADIUS, TERRAIN_NOISE_PERIOD, TERRAIN_SEGMENTS, WIDTH,
};
use super::geometry::Segment;

/// Immutable per-match terrain.
///
/// `floor` and `ceiling` hold one elevation per sample in `xs`. Larger y is lower
/// on screen, so the floor always has the greater elevation value.
#[derive(Debug, Clone)]
pub struct Terrain {
    xs: Vec<f32>,
    floor: Vec<f32>,
    ceiling: Vec<f32>,
    /// Floor edges, ceiling edges, then the left and right world walls
    segments: Vec<Segment>,
}

impl Terrain {
    /// Generate a fresh random cave
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let mid_noise = generate_noise(TERRAIN_SEGMENTS, TERRAIN_NOISE_PERIOD, rng);
        let height_noise = generate_noise(TERRAIN_SEGMENTS, TERRAIN_NOISE_PERIOD, rng);

        let mut floor = Vec::with_capacity(TERRAIN_SEGMENTS + 1);
        let mut ceiling = Vec::with_capacity(TERRAIN_SEGMENTS + 1);

        for (mid, height) in mid_noise.iter().zip(height_noise.iter()) {
            let y_mid = HEIGHT / 2.0 + (mid - 0.5) * (HEIGHT / 1.5);
            let cave_height = 300.0 + height * 100.0;

            let mut y_floor = (y_mid + cave_height / 2.0).min(HEIGHT - PLAYER_RADIUS);
            let mut y_ceiling = (y_mid - cave_height / 2.0).max(PLAYER_RADIUS);

            if y_floor - y_ceiling < MIN_CAVE_HEIGHT {
                y_ceiling = (y_floor - MIN_CAVE_HEIGHT).max(PLAYER_RADIUS);
                if y_floor - y_ceiling < MIN_CAVE_HEIGHT {
                    y_floor = (y_ceiling + MIN_CAVE_HEIGHT).min(HEIGHT - PLAYER_RADIUS);
                }
            }

            floor.push(y_floor);
            ceiling.push(y_ceiling);
        }

        Self::from_samples(floor, ceiling)
    }

    /// Build terrain from explicit floor/ceiling samples spread evenly over [0, WIDTH].
    ///
    /// Both vectors must have the same length of at least two.
    pub fn from_samples(floor: Vec<f32>, ceiling: Vec<f32>) -> Self {
        assert!(floor.len() >= 2, "terrain needs at least two samples");
        assert_eq!(floor.len(), ceiling.len(), "floor/ceiling sample count mismatch");

        let n = floor.len() - 1;
        let step = WIDTH / n as f32;
        let xs: Vec<f32> = (0..=n).map(|i| i as f32 * step).collect();

        let mut segments = Vec::with_capacity(2 * n + 2);
        for i in 0..n {
            segments.push(Segment::new(xs[i], floor[i], xs[i + 1], floor[i + 1]));
            segments.push(Segment::new(xs[i], ceiling[i], xs[i + 1], ceiling[i + 1]));
        }
        segments.push(Segment::new(0.0, ceiling[0], 0.0, floor[0]));
        segments.push(Segment::new(WIDTH, ceiling[n], WIDTH, floor[n]));

        Self {
            xs,
            floor,
            ceiling,
            segments,
        }
    }

    pub fn xs(&self) -> &[f32] {
        &self.xs
    }

    pub fn floor_samples(&self) -> &[f32] {
        &self.floor
    }

    pub fn ceiling_samples(&self) -> &[f32] {
        &self.ceiling
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn segment_count(&self) -> usize {
        self.xs.len() - 1
    }

    /// Index of the segment containing x, clamped to the first and last segment
    fn segment_index(&self, x: f32) -> usize {
        let n = self.segment_count();
        let width = WIDTH / n as f32;
        let i = (x / width).floor();
        if i <= 0.0 || i.is_nan() {
            0
        } else {
            (i as usize).min(n - 1)
        }
    }

    fn interpolate(&self, samples: &[f32], x: f32) -> f32 {
        let i = self.segment_index(x);
        let t = (x - self.xs[i]) / (self.xs[i + 1] - self.xs[i]);
        samples[i] + t * (samples[i + 1] - samples[i])
    }

    pub fn floor_at(&self, x: f32) -> f32 {
        self.interpolate(&self.floor, x)
    }

    pub fn ceiling_at(&self, x: f32) -> f32 {
        self.interpolate(&self.ceiling, x)
    }

    /// Angle of the floor segment under x, in radians (positive slopes downward to the right)
    pub fn slope_angle_at(&self, x: f32) -> f32 {
        let i = self.segment_index(x);
        let dx = self.xs[i + 1] - self.xs[i];
        let dy = self.floor[i + 1] - self.floor[i];
        dy.atan2(dx)
    }

    /// Smallest floor-to-ceiling gap over all samples
    #[cfg(test)]
    pub fn min_sample_gap(&self) -> f32 {
        self.floor
            .iter()
            .zip(self.ceiling.iter())
            .map(|(f, c)| f - c)
            .fold(f32::INFINITY, f32::min)
    }

    /// True when samples are strictly increasing in x and every gap meets the minimum
    #[cfg(test)]
    pub fn is_valid(&self) -> bool {
        self.xs.windows(2).all(|w| w[1] > w[0]) && self.min_sample_gap() >= MIN_CAVE_HEIGHT
    }
}

/// Value noise: random control points every `period` samples, linearly blended between.
fn generate_noise<R: Rng>(n: usize, period: usize, rng: &mut R) -> Vec<f32> {
    let period = period.max(1);
    let mut noise = vec![0.0f32; n + 1];

    let mut anchors: Vec<usize> = (0..=n).step_by(period).collect();
    if anchors.last() != Some(&n) {
        anchors.push(n);
    }

    for &a in &anchors {
        noise[a] = rng.gen::<f32>();
    }

    for pair in anchors.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let span = (end - start) as f32;
        for i in (start + 1)..end {
            let t = (i - start) as f32 / span;
            noise[i] = (1.0 - t) * noise[start] + t * noise[end];
        }
    }

    noise
}
