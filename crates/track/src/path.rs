use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Errors from constructing or sampling a track.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("sampling interval must be positive, got {0}")]
    InvalidInterval(f32),
    #[error("segment {segment} references control point {index} out of range ({count} points)")]
    PointOutOfRange {
        segment: usize,
        index: usize,
        count: usize,
    },
    #[error("segment {segment} does not start at the end point of segment {previous}")]
    Disconnected { segment: usize, previous: usize },
    #[error("segment {segment} has non-positive radius {radius}")]
    InvalidRadius { segment: usize, radius: f32 },
    #[error("control point {index} has non-finite coordinates")]
    NonFinitePoint { index: usize },
}

/// One drivable piece of the track, referencing shared control points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    /// Straight piece from one control point to another.
    Line { start: usize, end: usize },
    /// Circular arc between two control points.
    ///
    /// `right` selects the clockwise sweep (a right-hand curve when driving
    /// from start to end); otherwise the sweep is counter-clockwise.
    Arc {
        start: usize,
        end: usize,
        center: Vec2,
        radius: f32,
        right: bool,
    },
}

impl Segment {
    fn start_index(&self) -> usize {
        match *self {
            Segment::Line { start, .. } | Segment::Arc { start, .. } => start,
        }
    }

    fn end_index(&self) -> usize {
        match *self {
            Segment::Line { end, .. } | Segment::Arc { end, .. } => end,
        }
    }
}

/// Ordered, immutable track centerline with arclength bookkeeping.
#[derive(Debug, Clone)]
pub struct Track {
    points: Vec<Vec2>,
    segments: Vec<Segment>,
    /// Arclength of each segment, in order.
    lengths: Vec<f64>,
    total_length: f64,
    width: f32,
}

impl Track {
    /// Build a track from control points and an ordered segment chain.
    ///
    /// Validates point indices, arc radii, coordinate finiteness and that
    /// each segment begins at the control point the previous one ends on.
    pub fn new(points: Vec<Vec2>, segments: Vec<Segment>, width: f32) -> Result<Self, TrackError> {
        for (index, p) in points.iter().enumerate() {
            if !p.is_finite() {
                return Err(TrackError::NonFinitePoint { index });
            }
        }
        for (i, seg) in segments.iter().enumerate() {
            for index in [seg.start_index(), seg.end_index()] {
                if index >= points.len() {
                    return Err(TrackError::PointOutOfRange {
                        segment: i,
                        index,
                        count: points.len(),
                    });
                }
            }
            if let Segment::Arc { radius, .. } = *seg {
                if radius <= 0.0 {
                    return Err(TrackError::InvalidRadius { segment: i, radius });
                }
            }
            if i > 0 && seg.start_index() != segments[i - 1].end_index() {
                return Err(TrackError::Disconnected {
                    segment: i,
                    previous: i - 1,
                });
            }
        }

        let lengths: Vec<f64> = segments
            .iter()
            .map(|seg| segment_length(&points, seg))
            .collect();
        let total_length = lengths.iter().sum();

        Ok(Self {
            points,
            segments,
            lengths,
            total_length,
            width,
        })
    }

    /// Total arclength of the track in meters.
    pub fn total_length(&self) -> f64 {
        self.total_length
    }

    /// Total drivable width of the track in meters.
    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// The control point the track starts at, if any segment exists.
    pub fn start_point(&self) -> Option<Vec2> {
        self.segments
            .first()
            .map(|seg| self.points[seg.start_index()])
    }

    /// The control point the track ends at (the closure point for loops).
    pub fn end_point(&self) -> Option<Vec2> {
        self.segments
            .last()
            .map(|seg| self.points[seg.end_index()])
    }

    /// Sample the centerline at arclength steps of at most `interval`.
    ///
    /// Points are emitted at arclengths 0, interval, 2·interval, … plus the
    /// exact end point, so every consecutive pair is at most `interval`
    /// apart and the first point equals the track start. Pure and
    /// idempotent: the same interval on the same track yields an identical
    /// sequence.
    pub fn sample_path(&self, interval: f32) -> Result<Vec<Vec2>, TrackError> {
        if interval <= 0.0 || interval.is_nan() {
            return Err(TrackError::InvalidInterval(interval));
        }
        if self.segments.is_empty() {
            return Ok(Vec::new());
        }

        let step = interval as f64;
        let mut out = Vec::new();
        let mut s = 0.0;
        loop {
            out.push(self.point_at(s));
            s += step;
            if s >= self.total_length {
                break;
            }
        }

        let end = self.end_point().unwrap_or_default();
        if out.last() != Some(&end) {
            out.push(end);
        }
        Ok(out)
    }

    /// Evaluate the centerline point at global arclength `s`.
    fn point_at(&self, s: f64) -> Vec2 {
        let mut offset = 0.0;
        for (seg, &len) in self.segments.iter().zip(&self.lengths) {
            if s < offset + len {
                return eval_segment(&self.points, seg, len, s - offset);
            }
            offset += len;
        }
        // Past the end (or zero-length track): the final control point.
        self.end_point().unwrap_or_default()
    }
}

fn segment_length(points: &[Vec2], seg: &Segment) -> f64 {
    match *seg {
        Segment::Line { start, end } => points[start].distance(points[end]) as f64,
        Segment::Arc {
            start,
            end,
            center,
            radius,
            right,
        } => {
            let (_, sweep) = arc_sweep(points[start], points[end], center, right);
            radius as f64 * sweep
        }
    }
}

/// Start angle and sweep magnitude (in [0, 2π)) of an arc.
fn arc_sweep(start: Vec2, end: Vec2, center: Vec2, right: bool) -> (f64, f64) {
    let a0 = f64::atan2((start.y - center.y) as f64, (start.x - center.x) as f64);
    let a1 = f64::atan2((end.y - center.y) as f64, (end.x - center.x) as f64);
    let sweep = if right { a0 - a1 } else { a1 - a0 };
    (a0, sweep.rem_euclid(std::f64::consts::TAU))
}

fn eval_segment(points: &[Vec2], seg: &Segment, len: f64, t: f64) -> Vec2 {
    match *seg {
        Segment::Line { start, end } => {
            if t <= 0.0 {
                return points[start];
            }
            if t >= len {
                return points[end];
            }
            let frac = (t / len) as f32;
            points[start].lerp(points[end], frac)
        }
        Segment::Arc {
            start,
            end,
            center,
            radius,
            right,
        } => {
            if t <= 0.0 {
                return points[start];
            }
            if t >= len {
                return points[end];
            }
            let (a0, _) = arc_sweep(points[start], points[end], center, right);
            let dir = if right { -1.0 } else { 1.0 };
            let ang = a0 + dir * t / radius as f64;
            center + radius * Vec2::new(ang.cos() as f32, ang.sin() as f32)
        }
    }
}
