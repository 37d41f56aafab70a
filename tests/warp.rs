use approx::assert_relative_eq;
use geo::polygon;

use vrtkit::srs::{EpsgRegistry, SrsService};
use vrtkit::{
    warp, warp_dataset, Clipper, Dataset, VrtDocument, VrtError, WarpOptions, WarpedDataset,
};

fn fixture() -> WarpedDataset {
    // 4000x3000, xres 2.0, yres 2.0, tlx 500000, tly 4000000, EPSG:26911.
    WarpedDataset::from_text(include_str!("data/warped.json")).unwrap()
}

fn plain() -> Dataset {
    Dataset::from_text(include_str!("data/translate.json")).unwrap()
}

#[test]
fn reprojection_preserves_the_pixel_diagonal() {
    let registry = EpsgRegistry::new();
    let input = fixture();
    let opts = WarpOptions {
        dst_srs: Some(3857),
        ..Default::default()
    };
    let out = warp(&input, &opts, &registry).unwrap();

    // Expected numbers from the same service the engine used.
    let extent = input.extent().unwrap();
    let tl = registry.transform(26911, 3857, (extent[0], extent[3])).unwrap();
    let bl = registry.transform(26911, 3857, (extent[0], extent[2])).unwrap();
    let br = registry.transform(26911, 3857, (extent[1], extent[2])).unwrap();
    let tr = registry.transform(26911, 3857, (extent[1], extent[3])).unwrap();
    let source_diag = (4000.0_f64.powi(2) + 3000.0_f64.powi(2)).sqrt();
    let proj_diag = ((br.0 - tl.0).powi(2) + (tl.1 - br.1).powi(2)).sqrt();
    let expected_res = proj_diag / source_diag;

    let gt = out.geotransform().unwrap();
    assert_relative_eq!(gt.xres(), expected_res, max_relative = 1e-12);
    assert_relative_eq!(gt.yres(), expected_res, max_relative = 1e-12);

    // Document, SRS string and transformer all moved to the target system.
    assert!(out.srs().unwrap().contains("3857"));
    assert_eq!(out.epsg().unwrap(), 3857);
    assert_eq!(out.dst_geotransform().unwrap(), gt);
    // Source side of the transformer is untouched.
    assert_eq!(
        out.src_geotransform().unwrap(),
        input.geotransform().unwrap()
    );
    // cols/rows follow the projected bounding box at the new resolution.
    let tl_corner = (tl.0.min(bl.0), tl.1.max(tr.1));
    let br_corner = (tr.0.max(br.0), bl.1.min(br.1));
    let expected_cols = ((br_corner.0 - tl_corner.0) / expected_res).round() as i64;
    let expected_rows = ((tl_corner.1 - br_corner.1) / expected_res).round() as i64;
    assert_eq!(out.xsize().unwrap(), expected_cols);
    assert_eq!(out.ysize().unwrap(), expected_rows);
    assert_relative_eq!(gt.tlx(), tl_corner.0);
    assert_relative_eq!(gt.tly(), tl_corner.1);
}

#[test]
fn cutline_lands_in_pixel_space() {
    let registry = EpsgRegistry::new();
    let clip = polygon![
        (x: 501000.0, y: 3998000.0),
        (x: 503000.0, y: 3998000.0),
        (x: 503000.0, y: 3996000.0),
        (x: 501000.0, y: 3996000.0),
        (x: 501000.0, y: 3998000.0),
    ];
    let opts = WarpOptions {
        clipper: Some(Clipper::Polygon(clip)),
        ..Default::default()
    };
    let out = warp(&fixture(), &opts, &registry).unwrap();
    let cutline = out.cutline().unwrap();
    assert!(cutline.starts_with("POLYGON"));
    // (501000 - 500000) / 2 = 500, (4000000 - 3998000) / 2 = 1000.
    assert!(cutline.contains("500 1000"));
    assert!(cutline.contains("1500 2000"));
    // Extent unchanged without cropToCutline.
    assert_eq!(out.xsize().unwrap(), 4000);
}

#[test]
fn crop_to_cutline_shrinks_the_extent() {
    let registry = EpsgRegistry::new();
    let clip = polygon![
        (x: 501000.0, y: 3998000.0),
        (x: 503000.0, y: 3998000.0),
        (x: 503000.0, y: 3996000.0),
        (x: 501000.0, y: 3996000.0),
        (x: 501000.0, y: 3998000.0),
    ];
    let opts = WarpOptions {
        clipper: Some(Clipper::Polygon(clip)),
        crop_to_cutline: true,
        ..Default::default()
    };
    let out = warp(&fixture(), &opts, &registry).unwrap();
    assert_eq!(out.xsize().unwrap(), 1000);
    assert_eq!(out.ysize().unwrap(), 1000);
    let gt = out.geotransform().unwrap();
    assert_relative_eq!(gt.tlx(), 501000.0);
    assert_relative_eq!(gt.tly(), 3998000.0);
    assert_relative_eq!(gt.xres(), 2.0);
    assert_eq!(out.dst_geotransform().unwrap(), gt);
}

#[test]
fn inline_geojson_clipper() {
    let registry = EpsgRegistry::new();
    let geojson = serde_json::json!({
        "type": "Polygon",
        "coordinates": [[
            [501000.0, 3998000.0],
            [503000.0, 3998000.0],
            [503000.0, 3996000.0],
            [501000.0, 3996000.0],
            [501000.0, 3998000.0]
        ]]
    });
    let opts = WarpOptions {
        clipper: Some(Clipper::GeoJson(geojson)),
        ..Default::default()
    };
    let out = warp(&fixture(), &opts, &registry).unwrap();
    assert!(out.cutline().unwrap().starts_with("POLYGON"));
}

#[test]
fn non_polygon_clipper_is_rejected() {
    let registry = EpsgRegistry::new();
    let geojson = serde_json::json!({
        "type": "Point",
        "coordinates": [501000.0, 3998000.0]
    });
    let opts = WarpOptions {
        clipper: Some(Clipper::GeoJson(geojson)),
        ..Default::default()
    };
    let err = warp(&fixture(), &opts, &registry).unwrap_err();
    assert!(matches!(err, VrtError::InvalidClipper(_)));
}

#[test]
fn explicit_size_rescales_resolution() {
    let registry = EpsgRegistry::new();
    let opts = WarpOptions {
        width: Some(500),
        height: Some(480),
        ..Default::default()
    };
    let out = warp(&fixture(), &opts, &registry).unwrap();
    assert_eq!(out.xsize().unwrap(), 500);
    assert_eq!(out.ysize().unwrap(), 480);
    let gt = out.geotransform().unwrap();
    assert_relative_eq!(gt.xres(), 2.0 * 4000.0 / 500.0);
    assert_relative_eq!(gt.yres(), 2.0 * 3000.0 / 480.0);
}

#[test]
fn single_width_derives_height_from_the_extent() {
    let registry = EpsgRegistry::new();
    let opts = WarpOptions {
        width: Some(500),
        ..Default::default()
    };
    let out = warp(&fixture(), &opts, &registry).unwrap();
    assert_eq!(out.xsize().unwrap(), 500);
    // Square pixels: 16 map units, 6000 units of height -> 375 rows.
    assert_eq!(out.ysize().unwrap(), 375);
    let gt = out.geotransform().unwrap();
    assert_relative_eq!(gt.yres(), gt.xres());
}

#[test]
fn explicit_resolution_derives_size() {
    let registry = EpsgRegistry::new();
    let opts = WarpOptions {
        x_res: Some(4.0),
        y_res: Some(4.0),
        ..Default::default()
    };
    let out = warp(&fixture(), &opts, &registry).unwrap();
    assert_eq!(out.xsize().unwrap(), 2000);
    assert_eq!(out.ysize().unwrap(), 1500);
}

#[test]
fn alpha_band_synthesis() {
    let registry = EpsgRegistry::new();
    let opts = WarpOptions {
        dst_alpha: true,
        ..Default::default()
    };
    let out = warp(&fixture(), &opts, &registry).unwrap();
    assert_eq!(out.band_count().unwrap(), 5);
    assert_eq!(out.dst_alpha_band(), Some(5));
    let alpha = out.get_band(5).unwrap();
    assert_eq!(alpha["ColorInterp"]["$"], "Alpha");
    // UInt16 maximum minus one.
    let options = &out.document()["VRTDataset"]["GDALWarpOptions"]["Option"];
    assert_eq!(options[0]["@name"], "INIT_DEST");
    assert_eq!(options[0]["$"], 0);
    assert_eq!(options[1]["@name"], "DST_ALPHA_MAX");
    assert_eq!(options[1]["$"], 65535);
    // Bands are filtered down to the minimal attribute set.
    for band in out.bands().unwrap() {
        assert!(band.get("NoDataValue").is_none());
    }
    // Explicit nodata mapping is redundant with an alpha band.
    let mappings = &out.document()["VRTDataset"]["GDALWarpOptions"]["BandList"]["BandMapping"];
    assert!(mappings[0].get("DstNoDataReal").is_none());
}

#[test]
fn tiny_outputs_shrink_the_block_size() {
    let registry = EpsgRegistry::new();
    let opts = WarpOptions {
        width: Some(100),
        height: Some(100),
        ..Default::default()
    };
    let out = warp(&fixture(), &opts, &registry).unwrap();
    assert_eq!(out.blocksize().unwrap(), [100, 100]);
}

#[test]
fn plain_documents_are_converted_first() {
    let registry = EpsgRegistry::new();
    let out = warp_dataset(&plain(), &WarpOptions::default(), &registry).unwrap();
    let root = &out.document()["VRTDataset"];
    assert_eq!(root["@subClass"], "VRTWarpedDataset");
    assert!(root.get("GDALWarpOptions").is_some());
    assert_eq!(out.resample().unwrap(), "NearestNeighbour");
    assert_eq!(out.filename().unwrap(), "input.tif");
    // Bands lost their sources in the conversion.
    for band in out.bands().unwrap() {
        assert!(band.get("SimpleSource").is_none());
        assert_eq!(band["@subClass"], "VRTWarpedRasterBand");
    }
}

#[test]
fn resample_override_lands_in_the_options() {
    let registry = EpsgRegistry::new();
    let opts = WarpOptions {
        resample: "Cubic".to_string(),
        ..Default::default()
    };
    let out = warp(&fixture(), &opts, &registry).unwrap();
    assert_eq!(out.resample().unwrap(), "Cubic");
}

#[test]
fn warp_is_pure() {
    let registry = EpsgRegistry::new();
    let input = fixture();
    let before = input.to_text().unwrap();
    let opts = WarpOptions {
        dst_srs: Some(3857),
        dst_alpha: true,
        width: Some(100),
        height: Some(100),
        ..Default::default()
    };
    let _ = warp(&input, &opts, &registry).unwrap();
    assert_eq!(input.to_text().unwrap(), before);
}

#[test]
fn repeated_warp_recomputes_rather_than_noops() {
    let registry = EpsgRegistry::new();
    let opts = WarpOptions {
        width: Some(2000),
        ..Default::default()
    };
    let once = warp(&fixture(), &opts, &registry).unwrap();
    let twice = warp(&once, &opts, &registry).unwrap();
    // Same requested width, but the resolution rescaled again.
    assert_eq!(twice.xsize().unwrap(), 2000);
    let gt_once = once.geotransform().unwrap();
    let gt_twice = twice.geotransform().unwrap();
    assert_relative_eq!(gt_once.xres(), 4.0);
    assert_relative_eq!(gt_twice.xres(), 4.0);
}
