use gtk4 as gtk;

use gtk::cairo;
use gtk::DrawingArea;
use gtk4::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

use crate::app::OverlayState;
use crate::capture::Region;

const OUTLINE_RGBA: (f64, f64, f64, f64) = (0.0, 200.0 / 255.0, 0.0, 180.0 / 255.0);
const OUTLINE_WIDTH: f64 = 3.0;
const LABEL_FONT_SIZE: f64 = 13.0;
const LABEL_OFFSET: (f64, f64) = (5.0, 20.0);

/// Drawing area for the monitor covering `monitor` in virtual-screen pixels.
pub fn create_drawing_area(state: &Rc<RefCell<OverlayState>>, monitor: Region) -> DrawingArea {
    let drawing_area = DrawingArea::builder().hexpand(true).vexpand(true).build();

    drawing_area.set_draw_func({
        let state = state.clone();
        move |_, cr, _width, _height| {
            draw_regions(&state.borrow().regions_on(&monitor), cr);
        }
    });

    drawing_area
}

fn draw_regions(regions: &[Region], cr: &cairo::Context) {
    cr.set_operator(cairo::Operator::Clear);
    let _ = cr.paint();
    cr.set_operator(cairo::Operator::Over);

    let (r, g, b, a) = OUTLINE_RGBA;
    cr.set_source_rgba(r, g, b, a);
    cr.set_line_width(OUTLINE_WIDTH);
    cr.select_font_face("Sans", cairo::FontSlant::Normal, cairo::FontWeight::Normal);
    cr.set_font_size(LABEL_FONT_SIZE);

    for region in regions {
        draw_region(cr, region);
    }
}

fn draw_region(cr: &cairo::Context, region: &Region) {
    cr.rectangle(
        region.left as f64,
        region.top as f64,
        region.width as f64,
        region.height as f64,
    );
    let _ = cr.stroke();

    cr.move_to(
        region.left as f64 + LABEL_OFFSET.0,
        region.top as f64 + LABEL_OFFSET.1,
    );
    let _ = cr.show_text(&region.label());
}
