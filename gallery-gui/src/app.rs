use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use eframe::egui;
use egui::{Align2, Color32, FontId, RichText, Sense};
use gallery_core::{
    Article, ArticlePresenter, Event, FetchCoordinator, ImageSlot, LoaderHandle, PresenterEvent,
    UiConfig,
};
use tokio::runtime::Runtime;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::mpsc;

const PLACEHOLDER: Color32 = Color32::from_rgb(199, 199, 204);
const BACKGROUND: Color32 = Color32::from_rgb(229, 229, 234);
const CARD_FILL: Color32 = Color32::WHITE;
const ACCENT: Color32 = Color32::from_rgb(0, 122, 255);
const CARD_BODY_HEIGHT: f32 = 140.0;
const CARD_PADDING: f32 = 18.0;

fn glyph_symbol(name: &str) -> &'static str {
    match name {
        "saved" => "★",
        "save" => "☆",
        "liked" => "♥",
        _ => "♡",
    }
}

fn image_uri(url: &str) -> String {
    format!("bytes://{url}")
}

pub struct AppInit {
    pub runtime: Arc<Runtime>,
    pub loader: LoaderHandle,
    pub updates: mpsc::Receiver<Event>,
    pub coordinator: FetchCoordinator,
    pub ui: UiConfig,
}

/// One reusable card: a presenter plus the view-side fade bookkeeping.
struct Slot {
    presenter: ArticlePresenter,
    events: broadcast::Receiver<PresenterEvent>,
    fade_started: Option<f64>,
}

impl Slot {
    fn new(article: Article, coordinator: FetchCoordinator) -> Self {
        let presenter = ArticlePresenter::new(article, coordinator);
        let events = presenter.subscribe();
        Self {
            presenter,
            events,
            fade_started: None,
        }
    }

    fn poll_events(&mut self, now: f64) {
        loop {
            match self.events.try_recv() {
                Ok(PresenterEvent::ImageLoaded {
                    slot: ImageSlot::Article,
                    animated: true,
                }) => self.fade_started = Some(now),
                Ok(PresenterEvent::Rebound { .. }) => self.fade_started = None,
                Ok(_) => {}
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    fn fade_alpha(&mut self, now: f64, duration: Duration) -> f32 {
        let Some(start) = self.fade_started else {
            return 1.0;
        };
        let secs = duration.as_secs_f64();
        let progress = if secs > 0.0 { (now - start) / secs } else { 1.0 };
        if progress >= 1.0 {
            self.fade_started = None;
            1.0
        } else {
            progress.max(0.0) as f32
        }
    }
}

pub struct GalleryApp {
    runtime: Arc<Runtime>,
    loader: Option<LoaderHandle>,
    updates: mpsc::Receiver<Event>,
    coordinator: FetchCoordinator,
    ui: UiConfig,
    articles: Vec<Article>,
    slots: Vec<Slot>,
    loaded: bool,
}

impl GalleryApp {
    pub fn new(init: AppInit) -> Self {
        Self {
            runtime: init.runtime,
            loader: Some(init.loader),
            updates: init.updates,
            coordinator: init.coordinator,
            ui: init.ui,
            articles: Vec::new(),
            slots: Vec::new(),
            loaded: false,
        }
    }

    fn refresh_updates(&mut self) {
        while let Ok(Event::ArticlesLoaded(articles)) = self.updates.try_recv() {
            tracing::debug!(count = articles.len(), "article list received");
            self.articles = articles;
            self.loaded = true;
            for slot in &mut self.slots {
                slot.presenter.unbind();
                slot.fade_started = None;
            }
        }
    }

    /// Picks the pooled slot for `row` and binds it to that row's article.
    fn slot_for_row(&mut self, row: usize, visible: usize) -> usize {
        let pool = self.ui.presenter_pool_size.max(visible).max(1);
        let index = row % pool;
        let article = self.articles[row].clone();
        while self.slots.len() <= index {
            self.slots.push(Slot::new(article.clone(), self.coordinator.clone()));
        }
        self.slots[index].presenter.bind(article);
        index
    }

    fn needs_repaint(&self) -> bool {
        !self.loaded
            || self
                .slots
                .iter()
                .any(|slot| slot.presenter.is_loading() || slot.fade_started.is_some())
    }

    fn draw_article_list(&mut self, ui: &mut egui::Ui) {
        if !self.loaded {
            ui.vertical_centered(|ui| {
                ui.add_space(50.0);
                ui.spinner();
            });
            return;
        }
        if self.articles.is_empty() {
            ui.vertical_centered(|ui| {
                ui.add_space(50.0);
                ui.label(RichText::new("No articles available").size(16.0));
            });
            return;
        }

        let now = ui.input(|input| input.time);
        let card_height = self.ui.image_height + CARD_BODY_HEIGHT;
        ui.spacing_mut().item_spacing.y = self.ui.card_spacing;

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show_rows(ui, card_height, self.articles.len(), |ui, rows| {
                let visible = rows.len();
                for row in rows {
                    let index = self.slot_for_row(row, visible);
                    let slot = &mut self.slots[index];
                    slot.poll_events(now);
                    draw_card(ui, slot, &self.ui, card_height, now);
                }
            });
    }
}

fn draw_card(ui: &mut egui::Ui, slot: &mut Slot, style: &UiConfig, card_height: f32, now: f64) {
    let article = slot.presenter.article();
    let display = slot.presenter.display();

    egui::Frame::none().fill(CARD_FILL).show(ui, |ui| {
        ui.set_width(ui.available_width());
        ui.set_height(card_height);
        ui.spacing_mut().item_spacing.y = 0.0;

        let width = ui.available_width();
        let (rect, _) = ui.allocate_exact_size(egui::vec2(width, style.image_height), Sense::hover());
        ui.painter().rect_filled(rect, 0.0, PLACEHOLDER);
        if let Some(bytes) = slot.presenter.article_image() {
            let alpha = slot.fade_alpha(now, style.cross_fade());
            image_widget(&article.image_url, bytes)
                .tint(Color32::WHITE.gamma_multiply(alpha))
                .paint_at(ui, rect);
        }

        let painter = ui.painter();
        painter.text(
            rect.left_top() + egui::vec2(CARD_PADDING, CARD_PADDING),
            Align2::LEFT_TOP,
            glyph_symbol(display.saved_glyph),
            FontId::proportional(24.0),
            Color32::WHITE,
        );
        painter.text(
            rect.right_top() + egui::vec2(-CARD_PADDING, CARD_PADDING),
            Align2::RIGHT_TOP,
            format!("{}  {}", display.likes, glyph_symbol(display.liked_glyph)),
            FontId::proportional(20.0),
            Color32::WHITE,
        );

        egui::Frame::none()
            .inner_margin(egui::Margin::same(CARD_PADDING))
            .show(ui, |ui| {
                ui.spacing_mut().item_spacing.y = 12.0;
                ui.label(RichText::new(&display.category).size(17.0).color(ACCENT));
                ui.add(egui::Label::new(RichText::new(&display.title).size(18.0).strong()).truncate(true));
                ui.horizontal(|ui| {
                    let size = style.avatar_size;
                    let (avatar, _) = ui.allocate_exact_size(egui::vec2(size, size), Sense::hover());
                    match slot.presenter.author_image() {
                        Some(bytes) => {
                            image_widget(article.author_image_url(), bytes)
                                .rounding(size / 2.0)
                                .paint_at(ui, avatar);
                        }
                        None => {
                            ui.painter()
                                .circle_filled(avatar.center(), size / 2.0, PLACEHOLDER);
                        }
                    }
                    ui.vertical(|ui| {
                        ui.spacing_mut().item_spacing.y = 2.0;
                        ui.label(RichText::new(&display.author_name).size(16.0).color(ACCENT));
                        ui.label(RichText::new(&display.date).size(16.0).color(Color32::GRAY));
                    });
                });
            });
    });
}

fn image_widget(url: &str, bytes: Bytes) -> egui::Image<'static> {
    egui::Image::from_bytes(image_uri(url), bytes.to_vec())
}

impl Drop for GalleryApp {
    fn drop(&mut self) {
        if let Some(handle) = self.loader.take() {
            let _ = self.runtime.block_on(handle.stop());
        }
    }
}

impl eframe::App for GalleryApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.refresh_updates();

        egui::TopBottomPanel::top("title").show(ctx, |ui| {
            ui.heading(RichText::new("Articles").size(22.0).strong());
        });
        egui::CentralPanel::default()
            .frame(egui::Frame::central_panel(&ctx.style()).fill(BACKGROUND))
            .show(ctx, |ui| self.draw_article_list(ui));

        if self.needs_repaint() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }
}
