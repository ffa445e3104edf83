//! End-to-end checks of the engine's testable properties on small grids.

use approx::assert_relative_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};
use zonal_core::accumulate::merge_counts;
use zonal_core::{
    GeoTransform, GridStore, Polygon, RasterStrategy, Ring, ZonalConfig, ZonalEngine, ZoneStatus,
};

fn random_grid(seed: u64, rows: usize, cols: usize, t: GeoTransform) -> GridStore {
    let mut rng = StdRng::seed_from_u64(seed);
    GridStore::from_fn(rows, cols, t, Some(255), |_, _| {
        // Roughly 10% no-data, the rest spread over six classes.
        if rng.gen_bool(0.1) { 255 } else { rng.gen_range(1..=6) }
    })
    .unwrap()
}

fn star(id: &str, rng: &mut StdRng, cx: f64, cy: f64, max_r: f64) -> Polygon {
    let n = rng.gen_range(3..16);
    let mut angles: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..std::f64::consts::TAU)).collect();
    angles.sort_by(f64::total_cmp);
    angles.dedup();
    let ring = Ring::new(angles.iter().map(|&a| {
        let r = rng.gen_range(0.2 * max_r..max_r);
        (cx + r * a.cos(), cy + r * a.sin())
    }));
    Polygon::new(id, ring)
}

#[test]
fn uniform_grid_aligned_square() {
    let g = GridStore::filled(10, 10, GeoTransform::unit(), None, 3).unwrap();
    let polys = [Polygon::new("sq", Ring::rect(0.0, 0.0, 4.0, 4.0))];
    let report = ZonalEngine::new(&g, ZonalConfig::default()).run(&polys).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.table.classes(), &[3]);
    assert_eq!(report.table.area_of("sq", 3), Some(16.0));
    assert_eq!(report.table.rows()[0].status, ZoneStatus::Counted);
}

#[test]
fn other_run_classes_read_as_zero() {
    let g = GridStore::from_fn(10, 10, GeoTransform::unit(), None, |_, c| if c < 5 { 3 } else { 8 })
        .unwrap();
    let polys = [
        Polygon::new("left", Ring::rect(0.0, 0.0, 4.0, 4.0)),
        Polygon::new("right", Ring::rect(6.0, 0.0, 8.0, 2.0)),
    ];
    let report = ZonalEngine::new(&g, ZonalConfig::default()).run(&polys).unwrap();
    assert_eq!(report.table.classes(), &[3, 8]);
    assert_eq!(report.table.row("left").unwrap().areas, vec![16.0, 0.0]);
    assert_eq!(report.table.row("right").unwrap().areas, vec![0.0, 4.0]);
}

#[test]
fn nodata_footprint_has_zero_area() {
    let g = GridStore::from_fn(10, 10, GeoTransform::unit(), Some(0), |r, c| {
        if r < 5 && c < 5 { 0 } else { 2 }
    })
    .unwrap();
    let polys = [
        Polygon::new("void", Ring::rect(1.0, 1.0, 4.0, 4.0)),
        Polygon::new("land", Ring::rect(6.0, 6.0, 8.0, 8.0)),
    ];
    let report = ZonalEngine::new(&g, ZonalConfig::default()).run(&polys).unwrap();
    let void = report.table.row("void").unwrap();
    assert_eq!(void.total_area(), 0.0);
    assert_eq!(void.status, ZoneStatus::Counted);
    assert!(!report.table.classes().contains(&0));
}

#[test]
fn outside_grid_is_all_zero_row() {
    let g = GridStore::filled(10, 10, GeoTransform::unit(), None, 3).unwrap();
    let polys = [
        Polygon::new("in", Ring::rect(0.0, 0.0, 1.0, 1.0)),
        Polygon::new("out", Ring::rect(20.0, 20.0, 25.0, 25.0)),
    ];
    let report = ZonalEngine::new(&g, ZonalConfig::default()).run(&polys).unwrap();
    let out = report.table.row("out").unwrap();
    assert_eq!(out.status, ZoneStatus::NoOverlap);
    assert_eq!(out.areas, vec![0.0]);
}

#[test]
fn single_cell_polygon_on_north_up_grid() {
    // 30 m cells, top-left at (500000, 4000000). Cell (2, 3) spans
    // x in [500090, 500120), y in [3999910, 3999940).
    let t = GeoTransform::new(500_000.0, 4_000_000.0, 30.0, -30.0);
    let g = GridStore::from_fn(6, 6, t, None, |r, c| (r * 6 + c) as i32).unwrap();
    let polys = [Polygon::new("cell", Ring::rect(500_090.0, 3_999_910.0, 500_120.0, 3_999_940.0))];
    let report = ZonalEngine::new(&g, ZonalConfig::default()).run(&polys).unwrap();
    assert_eq!(report.table.classes(), &[15]);
    assert_relative_eq!(report.table.area_of("cell", 15).unwrap(), 900.0);
}

#[test]
fn area_sum_equals_included_cells_times_cell_area() {
    let t = GeoTransform::new(0.0, 64.0, 0.5, -0.25);
    let g = random_grid(11, 256, 128, t);
    let mut rng = StdRng::seed_from_u64(12);
    let polys: Vec<Polygon> = (0..30)
        .map(|i| {
            let (cx, cy) = (rng.gen_range(0.0..64.0), rng.gen_range(0.0..64.0));
            star(&format!("s{i}"), &mut rng, cx, cy, 12.0)
        })
        .collect();
    let engine = ZonalEngine::new(&g, ZonalConfig { check_simplicity: false, ..ZonalConfig::default() });
    let report = engine.run(&polys).unwrap();
    assert!(report.is_complete());
    for (poly, row) in polys.iter().zip(report.table.rows()) {
        // Brute force over the whole grid.
        let prepared = poly.prepare(false).unwrap();
        let mut expected = 0u64;
        for r in 0..g.rows() {
            for c in 0..g.cols() {
                let (x, y) = t.cell_center(r, c);
                if prepared.contains(x, y) && !g.is_nodata(g.get(r, c)) {
                    expected += 1;
                }
            }
        }
        assert_eq!(row.total_cells(), expected, "polygon {}", row.id);
        // Cell area 0.125 is a power of two, so the float sum is exact.
        assert_eq!(row.total_area(), expected as f64 * g.cell_area());
    }
}

#[test]
fn repeated_runs_are_identical() {
    let g = random_grid(3, 200, 200, GeoTransform::unit());
    let mut rng = StdRng::seed_from_u64(4);
    let polys: Vec<Polygon> = (0..25)
        .map(|i| {
            let (cx, cy) = (rng.gen_range(0.0..200.0), rng.gen_range(0.0..200.0));
            star(&format!("p{i}"), &mut rng, cx, cy, 30.0)
        })
        .collect();
    let engine = ZonalEngine::new(&g, ZonalConfig { check_simplicity: false, ..ZonalConfig::default() });
    let a = engine.run(&polys).unwrap();
    let b = engine.run(&polys).unwrap();
    assert_eq!(a.table, b.table);

    let mut csv_a = Vec::new();
    let mut csv_b = Vec::new();
    a.table.write_csv(&mut csv_a).unwrap();
    b.table.write_csv(&mut csv_b).unwrap();
    assert_eq!(csv_a, csv_b);
}

#[test]
fn sequential_and_parallel_tables_match() {
    let g = random_grid(5, 300, 300, GeoTransform::new(-10.0, -10.0, 0.1, 0.1));
    let mut rng = StdRng::seed_from_u64(6);
    let polys: Vec<Polygon> = (0..60)
        .map(|i| {
            let (cx, cy) = (rng.gen_range(-12.0..22.0), rng.gen_range(-12.0..22.0));
            star(&format!("p{i}"), &mut rng, cx, cy, 4.0)
        })
        .collect();
    let base = ZonalConfig { check_simplicity: false, ..ZonalConfig::default() };
    let seq = ZonalEngine::new(&g, ZonalConfig { parallel: false, ..base.clone() }).run(&polys).unwrap();
    let par = ZonalEngine::new(&g, ZonalConfig { parallel: true, workers: Some(4), ..base.clone() })
        .run(&polys)
        .unwrap();
    let pip = ZonalEngine::new(&g, ZonalConfig { strategy: RasterStrategy::PointInPolygon, ..base })
        .run(&polys)
        .unwrap();
    assert_eq!(seq.table, par.table);
    assert_eq!(seq.table, pip.table);
    let ids: Vec<String> = polys.iter().map(|p| p.id.clone()).collect();
    let row_ids: Vec<String> = par.table.rows().iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, row_ids);
}

#[test]
fn split_polygon_counts_add_up() {
    let g = random_grid(9, 120, 120, GeoTransform::new(0.0, 0.0, 0.75, 0.75));
    let engine = ZonalEngine::new(&g, ZonalConfig::sequential());
    let mut rng = StdRng::seed_from_u64(10);
    for k in 0..20 {
        // Quadrilateral cut along a slanted chord shared by both halves.
        let (x0, x1) = (rng.gen_range(0.0..30.0), rng.gen_range(60.0..90.0));
        let (y0, y1) = (rng.gen_range(0.0..30.0), rng.gen_range(60.0..90.0));
        let (cut_a, cut_b) = (rng.gen_range(x0 + 1.0..x1 - 1.0), rng.gen_range(x0 + 1.0..x1 - 1.0));
        let whole = Polygon::new("whole", Ring::rect(x0, y0, x1, y1));
        let left = Polygon::new("left", Ring::new([(x0, y0), (cut_a, y0), (cut_b, y1), (x0, y1)]));
        let right = Polygon::new("right", Ring::new([(cut_a, y0), (x1, y0), (x1, y1), (cut_b, y1)]));

        let w = engine.zonal_counts(&whole).unwrap().counts;
        let mut parts = engine.zonal_counts(&left).unwrap().counts;
        merge_counts(&mut parts, &engine.zonal_counts(&right).unwrap().counts);
        assert_eq!(w, parts, "split {k}");
    }
}

#[test]
fn hole_and_its_fill_partition_the_outer_ring() {
    let g = random_grid(21, 50, 50, GeoTransform::unit());
    let engine = ZonalEngine::new(&g, ZonalConfig::sequential());
    let outer = Ring::rect(5.0, 5.0, 40.0, 40.0);
    let hole = Ring::new([(12.5, 10.0), (30.0, 14.0), (25.0, 33.3), (10.0, 20.0)]);

    let full = engine.zonal_counts(&Polygon::new("full", outer.clone())).unwrap().counts;
    let mut parts = engine.zonal_counts(&Polygon::new("donut", outer).with_hole(hole.clone())).unwrap().counts;
    merge_counts(&mut parts, &engine.zonal_counts(&Polygon::new("plug", hole)).unwrap().counts);
    assert_eq!(full, parts);
}
