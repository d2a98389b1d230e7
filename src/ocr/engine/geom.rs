use crate::ocr::BBoxPx;

use super::Vertex;

pub(super) fn vertical_overlap_ratio(a: &BBoxPx, b: &BBoxPx) -> f32 {
    let iy1 = a.y.max(b.y);
    let iy2 = a.bottom().min(b.bottom());
    if iy2 <= iy1 {
        return 0.0;
    }
    let inter = (iy2 - iy1) as f32;
    inter / (a.h.min(b.h) as f32).max(1.0)
}

pub(super) fn union_bbox(a: &BBoxPx, b: &BBoxPx) -> BBoxPx {
    let x1 = a.x.min(b.x);
    let y1 = a.y.min(b.y);
    let x2 = a.right().max(b.right());
    let y2 = a.bottom().max(b.bottom());
    BBoxPx {
        x: x1,
        y: y1,
        w: x2 - x1,
        h: y2 - y1,
    }
}

/// Min/max envelope of polygon vertices. Negative coordinates clamp to zero.
pub(super) fn envelope(vertices: &[Vertex]) -> Option<BBoxPx> {
    let min_x = vertices.iter().map(|v| v.x).min()?.max(0);
    let min_y = vertices.iter().map(|v| v.y).min()?.max(0);
    let max_x = vertices.iter().map(|v| v.x).max()?.max(min_x);
    let max_y = vertices.iter().map(|v| v.y).max()?.max(min_y);
    Some(BBoxPx {
        x: min_x as u32,
        y: min_y as u32,
        w: (max_x - min_x) as u32,
        h: (max_y - min_y) as u32,
    })
}

/// Clips a box to the image; `None` when nothing of it remains visible.
pub(super) fn clamp_to_image(bbox: &BBoxPx, width: u32, height: u32) -> Option<BBoxPx> {
    let x1 = bbox.x.min(width);
    let y1 = bbox.y.min(height);
    let x2 = bbox.right().min(width);
    let y2 = bbox.bottom().min(height);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(BBoxPx {
        x: x1,
        y: y1,
        w: x2 - x1,
        h: y2 - y1,
    })
}

pub(super) fn expand(bbox: &BBoxPx, margin: u32) -> BBoxPx {
    let x = bbox.x.saturating_sub(margin);
    let y = bbox.y.saturating_sub(margin);
    BBoxPx {
        x,
        y,
        w: bbox.right().saturating_add(margin) - x,
        h: bbox.bottom().saturating_add(margin) - y,
    }
}
