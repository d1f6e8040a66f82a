//! Common geometry and handle types used across platforms

use serde::{Deserialize, Serialize};
use std::fmt;

/// Native handle of a top-level or child window. `0` means "no handle".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowHandle(pub i64);

impl WindowHandle {
    pub const NONE: WindowHandle = WindowHandle(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for WindowHandle {
    fn from(value: i64) -> Self {
        WindowHandle(value)
    }
}

/// A point in physical screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(&self, other: &Point) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dy = self.y as i64 - other.y as i64;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }
}

/// An axis-aligned rectangle in physical screen pixels (x, y, width, height)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge. Widened so edges past `i32::MAX` stay exact.
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    pub fn center(&self) -> Point {
        let cx = self.x as i64 + self.width as i64 / 2;
        let cy = self.y as i64 + self.height as i64 / 2;
        Point::new(clamp_i32(cx), clamp_i32(cy))
    }

    /// True when the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        (self.x as i64) < other.right()
            && (other.x as i64) < self.right()
            && (self.y as i64) < other.bottom()
            && (other.y as i64) < self.bottom()
    }

    pub fn contains_point(&self, point: &Point) -> bool {
        point.x >= self.x
            && (point.x as i64) < self.right()
            && point.y >= self.y
            && (point.y as i64) < self.bottom()
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

impl std::str::FromStr for Rect {
    type Err = String;

    /// Parses `x,y,width,height`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(|p| p.trim()).collect();
        if parts.len() != 4 {
            return Err(format!("expected 'x,y,width,height', got '{s}'"));
        }
        let mut values = [0i32; 4];
        for (slot, part) in values.iter_mut().zip(parts.iter()) {
            *slot = part
                .parse::<i32>()
                .map_err(|_| format!("invalid number '{part}' in rectangle '{s}'"))?;
        }
        Ok(Rect::new(values[0], values[1], values[2], values[3]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersects_overlapping_and_disjoint() {
        let region = Rect::new(0, 0, 100, 100);
        assert!(region.intersects(&Rect::new(10, 10, 20, 20)));
        assert!(!region.intersects(&Rect::new(500, 500, 20, 20)));
        // Touching edges do not share a pixel
        assert!(!region.intersects(&Rect::new(100, 0, 10, 10)));
    }

    #[test]
    fn test_empty_rect_never_intersects() {
        let region = Rect::new(0, 0, 100, 100);
        assert!(!region.intersects(&Rect::new(10, 10, 0, 20)));
        assert_eq!(Rect::new(0, 0, -5, 10).area(), 0);
    }

    #[test]
    fn test_parse_rect() {
        let rect: Rect = "10, 20,30,40".parse().unwrap();
        assert_eq!(rect, Rect::new(10, 20, 30, 40));
        assert!("1,2,3".parse::<Rect>().is_err());
        assert!("a,b,c,d".parse::<Rect>().is_err());
    }

    #[test]
    fn test_center_and_distance() {
        let rect = Rect::new(10, 10, 20, 20);
        assert_eq!(rect.center(), Point::new(20, 20));
        assert_eq!(Point::new(0, 0).distance_squared(&Point::new(3, 4)), 25);
    }

    #[test]
    fn test_edges_near_i32_max_do_not_overflow() {
        let region = Rect::new(i32::MAX - 47, 0, 100, 100);
        assert_eq!(region.right(), i32::MAX as i64 + 53);
        assert!(region.intersects(&Rect::new(i32::MAX - 10, 10, 5, 5)));
        assert!(!region.intersects(&Rect::new(0, 0, 100, 100)));
        assert_eq!(region.center().x, i32::MAX);
        assert!(region.contains_point(&Point::new(i32::MAX, 50)));

        let far = Point::new(i32::MIN, i32::MIN).distance_squared(&Point::new(i32::MAX, i32::MAX));
        assert_eq!(far, i64::MAX);
    }
}
