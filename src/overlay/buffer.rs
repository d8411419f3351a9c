use std::f64::consts::{FRAC_PI_2, PI};

use geo::{
    orient::{Direction, Orient},
    Coord, LineString, MultiPolygon, Polygon,
};
use serde::Deserialize;

use crate::{
    error::{AnalysisError, Result},
    geofile::FeatureCollection,
};

use super::{
    ogr::{ogr_buffer, ogr_union},
    simplest_geometry, to_multi_polygon,
};

/// How the buffer outline turns around convex corners.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JoinStyle {
    Round,
    /// Sharp corners. A corner whose tip lies further than `limit × distance` from the vertex is
    /// cut off like a bevel.
    Miter { limit: f64 },
    Bevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BufferStyle {
    pub join: JoinStyle,
    /// Segments used to approximate a quarter circle.
    pub quadrant_segments: u32,
}

impl Default for BufferStyle {
    fn default() -> Self {
        Self {
            join: JoinStyle::Round,
            quadrant_segments: 16,
        }
    }
}

/// Inflate every geometry of a collection by `distance`, in the linear unit of its projected CRS.
/// Attributes are kept. A distance of zero returns the geometries unchanged.
pub fn buffer(
    collection: &FeatureCollection,
    distance: f64,
    style: &BufferStyle,
) -> Result<FeatureCollection> {
    // Also rejects NaN.
    if !(distance >= 0.0) {
        return Err(AnalysisError::InvalidBufferDistance(distance));
    }
    let crs = collection.require_crs()?;
    if !crs.is_projected() {
        return Err(AnalysisError::NotProjected(crs.to_string()));
    }
    if distance == 0.0 {
        return Ok(collection.clone());
    }
    log::debug!(
        "Buffering {} features by {} with {:?}",
        collection.len(),
        distance,
        style
    );
    let geometries = collection
        .geometries()
        .map(|geometry| buffer_geometry(geometry, distance, style).map(simplest_geometry))
        .collect::<Result<Vec<_>>>()?;
    Ok(collection.with_geometries(geometries, Some(crs.clone())))
}

/// Planar inflation of one geometry.
///
/// Round joins are left to GEOS. Miter and bevel outlines are the union of simple pieces: the
/// polygon itself, one rectangle per edge extending `distance` outwards, and a join piece at
/// every convex vertex. Points become regular polygons and line strings get rectangles on both
/// sides with round caps. GEOS merges the pieces, which share edges exactly.
pub fn buffer_geometry(
    geometry: &geo::Geometry,
    distance: f64,
    style: &BufferStyle,
) -> Result<MultiPolygon> {
    let buffered = match style.join {
        JoinStyle::Round => ogr_buffer(&planar_geometry(geometry), distance, style.quadrant_segments)?,
        JoinStyle::Miter { .. } | JoinStyle::Bevel => {
            let mut pieces = Vec::new();
            collect_pieces(geometry, distance, style, &mut pieces);
            if pieces.is_empty() {
                return Ok(MultiPolygon::new(pieces));
            }
            ogr_union(&MultiPolygon::new(pieces))?
        }
    };
    match buffered {
        geo::Geometry::GeometryCollection(collection) if collection.0.is_empty() => {
            Ok(MultiPolygon::new(Vec::new()))
        }
        other => to_multi_polygon(&other, "buffer"),
    }
}

/// Lines, rectangles and triangles have no WKB form of their own.
fn planar_geometry(geometry: &geo::Geometry) -> geo::Geometry {
    match geometry {
        geo::Geometry::Line(line) => {
            geo::Geometry::LineString(LineString::new(vec![line.start, line.end]))
        }
        geo::Geometry::Rect(rect) => geo::Geometry::Polygon(rect.to_polygon()),
        geo::Geometry::Triangle(triangle) => geo::Geometry::Polygon(triangle.to_polygon()),
        geo::Geometry::GeometryCollection(collection) => geo::Geometry::GeometryCollection(
            collection.iter().map(planar_geometry).collect(),
        ),
        other => other.clone(),
    }
}

fn collect_pieces(
    geometry: &geo::Geometry,
    distance: f64,
    style: &BufferStyle,
    pieces: &mut Vec<Polygon>,
) {
    match geometry {
        geo::Geometry::Point(point) => pieces.push(circle(point.0, distance, style)),
        geo::Geometry::MultiPoint(points) => {
            for point in points {
                pieces.push(circle(point.0, distance, style));
            }
        }
        geo::Geometry::Line(line) => line_pieces(&[line.start, line.end], distance, style, pieces),
        geo::Geometry::LineString(line_string) => {
            line_pieces(&line_string.0, distance, style, pieces)
        }
        geo::Geometry::MultiLineString(line_strings) => {
            for line_string in line_strings {
                line_pieces(&line_string.0, distance, style, pieces);
            }
        }
        geo::Geometry::Polygon(polygon) => polygon_pieces(polygon, distance, style, pieces),
        geo::Geometry::MultiPolygon(polygons) => {
            for polygon in polygons {
                polygon_pieces(polygon, distance, style, pieces);
            }
        }
        geo::Geometry::Rect(rect) => polygon_pieces(&rect.to_polygon(), distance, style, pieces),
        geo::Geometry::Triangle(triangle) => {
            polygon_pieces(&triangle.to_polygon(), distance, style, pieces)
        }
        geo::Geometry::GeometryCollection(collection) => {
            for geometry in collection {
                collect_pieces(geometry, distance, style, pieces);
            }
        }
    }
}

fn polygon_pieces(
    polygon: &Polygon,
    distance: f64,
    style: &BufferStyle,
    pieces: &mut Vec<Polygon>,
) {
    // Exterior counter-clockwise, holes clockwise: the polygon's interior is left of every ring.
    let oriented = polygon.orient(Direction::Default);
    let exterior = distinct_coords(&oriented.exterior().0);
    if exterior.len() < 3 {
        // Collapsed to a point or a line.
        line_pieces(&exterior, distance, style, pieces);
        return;
    }
    pieces.push(oriented.clone());
    ring_pieces(&exterior, distance, style, pieces);
    for interior in oriented.interiors() {
        let hole = distinct_coords(&interior.0);
        if hole.len() >= 3 {
            ring_pieces(&hole, distance, style, pieces);
        }
    }
}

/// Pieces along a closed ring whose interior lies to its left. `coords` must not repeat the
/// first coordinate at the end.
fn ring_pieces(coords: &[Coord], distance: f64, style: &BufferStyle, pieces: &mut Vec<Polygon>) {
    let count = coords.len();
    for index in 0..count {
        let start = coords[index];
        let end = coords[(index + 1) % count];
        if let Some(normal) = right_normal(start, end) {
            pieces.push(piece(vec![
                start,
                end,
                offset(end, normal, distance),
                offset(start, normal, distance),
            ]));
        }
    }
    for index in 0..count {
        let previous = coords[(index + count - 1) % count];
        let vertex = coords[index];
        let next = coords[(index + 1) % count];
        // Only convex vertices leave a gap between the rectangles of adjacent edges.
        if turn(previous, vertex, next) <= 0.0 {
            continue;
        }
        if let (Some(from), Some(to)) = (right_normal(previous, vertex), right_normal(vertex, next))
        {
            pieces.push(join_piece(vertex, from, to, distance, style));
        }
    }
}

fn line_pieces(coords: &[Coord], distance: f64, style: &BufferStyle, pieces: &mut Vec<Polygon>) {
    let coords = distinct_coords(coords);
    match coords.len() {
        0 => return,
        1 => {
            pieces.push(circle(coords[0], distance, style));
            return;
        }
        _ => {}
    }
    for segment in coords.windows(2) {
        if let Some(normal) = right_normal(segment[0], segment[1]) {
            pieces.push(piece(vec![
                offset(segment[0], normal, distance),
                offset(segment[1], normal, distance),
                offset(segment[1], normal, -distance),
                offset(segment[0], normal, -distance),
            ]));
        }
    }
    for window in coords.windows(3) {
        let (previous, vertex, next) = (window[0], window[1], window[2]);
        let (from, to) = match (right_normal(previous, vertex), right_normal(vertex, next)) {
            (Some(from), Some(to)) => (from, to),
            _ => continue,
        };
        let turn = turn(previous, vertex, next);
        if turn > 0.0 {
            // Left turn, the gap opens on the right.
            pieces.push(join_piece(vertex, from, to, distance, style));
        } else if turn < 0.0 {
            pieces.push(join_piece(vertex, negate(to), negate(from), distance, style));
        } else if dot(from, to) < 0.0 {
            // The line doubles back and the vertex is capped like an end.
            pieces.push(piece(arc(vertex, from, to, distance, style.quadrant_segments)));
        }
    }

    let count = coords.len();
    if let Some(normal) = right_normal(coords[0], coords[1]) {
        let cap = arc(coords[0], negate(normal), normal, distance, style.quadrant_segments);
        pieces.push(piece(cap));
    }
    if let Some(normal) = right_normal(coords[count - 2], coords[count - 1]) {
        let cap = arc(coords[count - 1], normal, negate(normal), distance, style.quadrant_segments);
        pieces.push(piece(cap));
    }
}

/// Fill the wedge at `vertex` between the offsets along unit normals `from` and `to`, which are
/// less than half a turn apart counter-clockwise.
fn join_piece(vertex: Coord, from: Coord, to: Coord, distance: f64, style: &BufferStyle) -> Polygon {
    let bevel = || piece(vec![vertex, offset(vertex, from, distance), offset(vertex, to, distance)]);
    match style.join {
        JoinStyle::Round => {
            let mut coords = vec![vertex];
            coords.extend(arc(vertex, from, to, distance, style.quadrant_segments));
            piece(coords)
        }
        JoinStyle::Bevel => bevel(),
        JoinStyle::Miter { limit } => {
            let cos_angle = dot(from, to);
            // The miter tip lies 1 / cos(angle / 2) distances from the vertex.
            let cos_half_angle = ((1.0 + cos_angle) / 2.0).sqrt();
            if cos_half_angle <= 0.0 || 1.0 / cos_half_angle > limit {
                return bevel();
            }
            let tip_scale = distance / (1.0 + cos_angle);
            let tip = Coord {
                x: vertex.x + (from.x + to.x) * tip_scale,
                y: vertex.y + (from.y + to.y) * tip_scale,
            };
            piece(vec![
                vertex,
                offset(vertex, from, distance),
                tip,
                offset(vertex, to, distance),
            ])
        }
    }
}

/// Points on the circle of radius `distance` around `center`, counter-clockwise from direction
/// `from` to direction `to`. The end points are exact offsets so that pieces share edges.
fn arc(center: Coord, from: Coord, to: Coord, distance: f64, quadrant_segments: u32) -> Vec<Coord> {
    let start_angle = from.y.atan2(from.x);
    let mut sweep = to.y.atan2(to.x) - start_angle;
    if sweep <= 0.0 {
        sweep += 2.0 * PI;
    }
    let max_step = FRAC_PI_2 / quadrant_segments.max(1) as f64;
    let steps = ((sweep / max_step) - 1e-9).ceil().max(1.0) as usize;

    let mut coords = Vec::with_capacity(steps + 1);
    coords.push(offset(center, from, distance));
    for step in 1..steps {
        let angle = start_angle + sweep * step as f64 / steps as f64;
        coords.push(Coord {
            x: center.x + distance * angle.cos(),
            y: center.y + distance * angle.sin(),
        });
    }
    coords.push(offset(center, to, distance));
    coords
}

fn circle(center: Coord, distance: f64, style: &BufferStyle) -> Polygon {
    let segments = 4 * style.quadrant_segments.max(1) as usize;
    let coords = (0..segments)
        .map(|index| {
            let angle = 2.0 * PI * index as f64 / segments as f64;
            Coord {
                x: center.x + distance * angle.cos(),
                y: center.y + distance * angle.sin(),
            }
        })
        .collect();
    piece(coords)
}

fn piece(coords: Vec<Coord>) -> Polygon {
    Polygon::new(LineString::new(coords), Vec::new()).orient(Direction::Default)
}

/// Coordinates without consecutive repeats, and without a closing repeat of the first one.
fn distinct_coords(coords: &[Coord]) -> Vec<Coord> {
    let mut distinct: Vec<Coord> = Vec::with_capacity(coords.len());
    for coord in coords {
        if distinct.last() != Some(coord) {
            distinct.push(*coord);
        }
    }
    if distinct.len() > 1 && distinct.first() == distinct.last() {
        distinct.pop();
    }
    distinct
}

/// Unit normal to the right of the direction from `start` to `end`.
fn right_normal(start: Coord, end: Coord) -> Option<Coord> {
    let (dx, dy) = (end.x - start.x, end.y - start.y);
    let length = dx.hypot(dy);
    if length == 0.0 {
        return None;
    }
    Some(Coord {
        x: dy / length,
        y: -dx / length,
    })
}

/// Positive for a left turn at `vertex`, negative for a right turn, zero when straight.
fn turn(previous: Coord, vertex: Coord, next: Coord) -> f64 {
    let (ax, ay) = (vertex.x - previous.x, vertex.y - previous.y);
    let (bx, by) = (next.x - vertex.x, next.y - vertex.y);
    ax * by - ay * bx
}

fn offset(coord: Coord, direction: Coord, distance: f64) -> Coord {
    Coord {
        x: coord.x + direction.x * distance,
        y: coord.y + direction.y * distance,
    }
}

fn negate(coord: Coord) -> Coord {
    Coord {
        x: -coord.x,
        y: -coord.y,
    }
}

fn dot(a: Coord, b: Coord) -> f64 {
    a.x * b.x + a.y * b.y
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use approx::assert_relative_eq;
    use geo::{Area, Contains, MultiPolygon};
    use rstest::rstest;

    use super::{buffer, buffer_geometry, BufferStyle, JoinStyle};
    use crate::{
        crs::Crs,
        error::AnalysisError,
        geofile::{
            collection::tests::{british_national_grid, square},
            Feature, FeatureCollection,
        },
        overlay::to_multi_polygon,
    };

    fn point_collection() -> FeatureCollection {
        let station = Feature::from(geo::Geometry::Point(geo::Point::new(530000.0, 180000.0)));
        FeatureCollection::from_features(vec![station], Some(british_national_grid())).unwrap()
    }

    fn style(join: JoinStyle) -> BufferStyle {
        BufferStyle {
            join,
            ..BufferStyle::default()
        }
    }

    /// Star-shaped park outline around a British National Grid location, with uneven radii.
    fn jagged_park(vertex_count: usize) -> geo::Polygon {
        let (center_x, center_y) = (530000.0, 180000.0);
        let coords: Vec<(f64, f64)> = (0..vertex_count)
            .map(|index| {
                let angle = 2.0 * PI * index as f64 / vertex_count as f64;
                let k = index as f64;
                let radius = 250.0 * (1.0 + 0.4 * (2.7 * k).sin() * (1.3 * k).cos());
                (center_x + radius * angle.cos(), center_y + radius * angle.sin())
            })
            .collect();
        geo::Polygon::new(coords.into(), Vec::new())
    }

    #[test]
    fn test_point_buffer_approximates_circle() {
        let buffered = buffer(&point_collection(), 3000.0, &BufferStyle::default()).unwrap();
        let area = buffered.features()[0].geometry.unsigned_area();
        assert_relative_eq!(area, PI * 3000.0 * 3000.0, max_relative = 0.005);
        assert!(matches!(
            buffered.features()[0].geometry,
            geo::Geometry::Polygon(_)
        ));
    }

    #[rstest]
    #[case(JoinStyle::Round, 100.0 + 40.0 + PI)]
    #[case(JoinStyle::Bevel, 100.0 + 40.0 + 2.0)]
    #[case(JoinStyle::Miter { limit: 5.0 }, 144.0)]
    // A square corner's miter tip is sqrt(2) distances away, beyond this limit.
    #[case(JoinStyle::Miter { limit: 1.2 }, 100.0 + 40.0 + 2.0)]
    fn test_square_buffer_join_styles(#[case] join: JoinStyle, #[case] expected_area: f64) {
        let geometry = square(0.0, 0.0, 10.0, "a").geometry;
        let buffered = buffer_geometry(&geometry, 1.0, &style(join)).unwrap();
        assert_eq!(1, buffered.0.len());
        assert_relative_eq!(buffered.unsigned_area(), expected_area, max_relative = 1e-3);
    }

    #[test]
    fn test_holes_shrink() {
        let exterior = geo::Rect::new((0.0, 0.0), (10.0, 10.0)).to_polygon().exterior().clone();
        let hole = geo::Rect::new((4.0, 4.0), (6.0, 6.0)).to_polygon().exterior().clone();
        let polygon = geo::Geometry::Polygon(geo::Polygon::new(exterior, vec![hole]));
        let buffered =
            buffer_geometry(&polygon, 0.5, &style(JoinStyle::Miter { limit: 5.0 })).unwrap();
        // 11 x 11 outside, the hole shrinks to 1 x 1 with sharp corners.
        assert_relative_eq!(buffered.unsigned_area(), 121.0 - 1.0, max_relative = 1e-9);
    }

    #[test]
    fn test_line_buffer_is_a_capsule() {
        let line = geo::Geometry::LineString(vec![(0.0, 0.0), (10.0, 0.0)].into());
        let buffered = buffer_geometry(&line, 1.0, &BufferStyle::default()).unwrap();
        assert_relative_eq!(buffered.unsigned_area(), 20.0 + PI, max_relative = 1e-3);
    }

    #[rstest]
    #[case(JoinStyle::Round)]
    #[case(JoinStyle::Bevel)]
    #[case(JoinStyle::Miter { limit: 5.0 })]
    fn test_line_doubling_back_is_capped(#[case] join: JoinStyle) {
        // Out to x = 10 and back to x = 5: both ends at x = 0 and x = 10 get a half disc.
        let line = geo::Geometry::LineString(vec![(0.0, 0.0), (10.0, 0.0), (5.0, 0.0)].into());
        let buffered = buffer_geometry(&line, 1.0, &style(join)).unwrap();
        assert_relative_eq!(buffered.unsigned_area(), 20.0 + PI, max_relative = 1e-3);
        assert!(buffered.contains(&geo::Point::new(10.9, 0.0)));
    }

    #[test]
    fn test_zero_distance_returns_originals() {
        let parks = FeatureCollection::from_features(
            vec![square(0.0, 0.0, 10.0, "a"), square(20.0, 0.0, 5.0, "b")],
            Some(british_national_grid()),
        )
        .unwrap();
        let buffered = buffer(&parks, 0.0, &BufferStyle::default()).unwrap();
        assert_eq!(parks.features(), buffered.features());
    }

    #[rstest]
    #[case(JoinStyle::Round)]
    #[case(JoinStyle::Bevel)]
    #[case(JoinStyle::Miter { limit: 5.0 })]
    fn test_buffers_grow_with_distance(#[case] join: JoinStyle) {
        let geometries = [
            geo::Geometry::Point(geo::Point::new(0.0, 0.0)),
            square(0.0, 0.0, 10.0, "a").geometry,
            geo::Geometry::LineString(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)].into()),
        ];
        for geometry in &geometries {
            let smaller = buffer_geometry(geometry, 1.0, &style(join)).unwrap();
            let larger = buffer_geometry(geometry, 3.0, &style(join)).unwrap();
            assert!(larger.contains(&smaller));
            let original = to_multi_polygon(geometry, "test").map(|polygon| polygon.unsigned_area());
            if let Ok(original_area) = original {
                assert!(smaller.unsigned_area() > original_area);
            }
        }
    }

    #[rstest]
    #[case(JoinStyle::Round)]
    #[case(JoinStyle::Bevel)]
    #[case(JoinStyle::Miter { limit: 2.0 })]
    fn test_jagged_park_buffers(#[case] join: JoinStyle) {
        let park = jagged_park(64);
        let parks = FeatureCollection::from_features(
            vec![Feature::from(geo::Geometry::Polygon(park.clone()))],
            Some(british_national_grid()),
        )
        .unwrap();
        let smaller = buffer(&parks, 30.0, &style(join)).unwrap();
        let larger = buffer(&parks, 60.0, &style(join)).unwrap();
        let smaller = to_multi_polygon(&smaller.features()[0].geometry, "test").unwrap();
        let larger = to_multi_polygon(&larger.features()[0].geometry, "test").unwrap();

        assert!(smaller.contains(&park));
        assert!(larger.contains(&smaller));
        assert!(smaller.unsigned_area() > park.unsigned_area());
    }

    #[test]
    fn test_multi_point_buffers_merge() {
        let points = geo::Geometry::MultiPoint(vec![(0.0, 0.0), (1.0, 0.0)].into());
        let buffered: MultiPolygon =
            buffer_geometry(&points, 1.0, &style(JoinStyle::Bevel)).unwrap();
        assert_eq!(1, buffered.0.len());
        assert!(buffered.unsigned_area() < 2.0 * PI);
    }

    #[test]
    fn test_negative_distance_is_rejected() {
        let result = buffer(&point_collection(), -1.0, &BufferStyle::default());
        assert!(matches!(
            result,
            Err(AnalysisError::InvalidBufferDistance(distance)) if distance == -1.0
        ));
        let result = buffer(&point_collection(), f64::NAN, &BufferStyle::default());
        assert!(matches!(
            result,
            Err(AnalysisError::InvalidBufferDistance(distance)) if distance.is_nan()
        ));
    }

    #[test]
    fn test_geographic_crs_is_rejected() {
        let station = Feature::from(geo::Geometry::Point(geo::Point::new(-0.1, 51.5)));
        let stations =
            FeatureCollection::from_features(vec![station], Some(Crs::from_epsg(4326).unwrap()))
                .unwrap();
        assert!(matches!(
            buffer(&stations, 100.0, &BufferStyle::default()),
            Err(AnalysisError::NotProjected(_))
        ));
    }
}
