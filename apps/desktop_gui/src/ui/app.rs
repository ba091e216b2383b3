use client_core::{ConnectionStatus, DashboardView, PedalCard};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use serde::{Deserialize, Serialize};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiEvent};
use crate::controller::orchestration::dispatch_backend_command;
use crate::ui::gauge::{show_gauge, GaugeColors};

pub const SETTINGS_STORAGE_KEY: &str = "pedal_dashboard_settings";

const ALERT_FILL: egui::Color32 = egui::Color32::from_rgb(176, 32, 32);
const ACCEL_ACTIVE: egui::Color32 = egui::Color32::from_rgb(46, 160, 67);
const BRAKE_ACTIVE: egui::Color32 = egui::Color32::from_rgb(214, 69, 65);
const CARD_IDLE: egui::Color32 = egui::Color32::from_rgb(52, 56, 66);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedDashboardSettings {
    pub server_url: String,
}

#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub server_url: String,
    pub auto_connect: bool,
}

pub struct DashboardApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    server_url: String,
    view: DashboardView,
    session_active: bool,
    status: String,
    status_banner: Option<UiError>,
}

impl DashboardApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        startup: StartupConfig,
        persisted: Option<PersistedDashboardSettings>,
    ) -> Self {
        let server_url = persisted
            .map(|p| p.server_url)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(startup.server_url);
        let mut app = Self {
            cmd_tx,
            ui_rx,
            server_url,
            view: DashboardView::default(),
            session_active: false,
            status: "Not connected".to_string(),
            status_banner: None,
        };
        if startup.auto_connect {
            app.connect();
        }
        app
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Info(message) => self.status = message,
                UiEvent::ViewUpdated(view) => {
                    if view.connection == ConnectionStatus::Connected {
                        self.status_banner = None;
                    }
                    self.view = view;
                }
                UiEvent::SessionEnded => {
                    self.session_active = false;
                    self.view.connection = ConnectionStatus::Disconnected;
                }
                UiEvent::Error(err) => {
                    tracing::warn!(context = ?err.context(), category = ?err.category(), "{}", err.message());
                    self.status = format!("{}: {}", err.label(), err.message());
                    self.session_active = false;
                    self.status_banner = Some(err);
                }
            }
        }
    }

    fn connect(&mut self) {
        let server_url = self.server_url.trim().to_string();
        self.session_active = true;
        self.status_banner = None;
        self.status = format!("Connecting to {server_url}...");
        dispatch_backend_command(
            &self.cmd_tx,
            BackendCommand::Connect { server_url },
            &mut self.status,
        );
    }

    fn disconnect(&mut self) {
        dispatch_backend_command(&self.cmd_tx, BackendCommand::Disconnect, &mut self.status);
    }

    fn show_alert_overlay(&self, ctx: &egui::Context) {
        if !self.view.alert_visible {
            return;
        }
        egui::Area::new(egui::Id::new("sudden_acceleration_overlay"))
            .order(egui::Order::Foreground)
            .anchor(egui::Align2::CENTER_TOP, egui::vec2(0.0, 72.0))
            .show(ctx, |ui| {
                egui::Frame::NONE
                    .fill(ALERT_FILL)
                    .corner_radius(10.0)
                    .inner_margin(egui::Margin::symmetric(28, 18))
                    .show(ui, |ui| {
                        ui.label(
                            egui::RichText::new("⚠ Sudden acceleration suspected")
                                .size(26.0)
                                .strong()
                                .color(egui::Color32::WHITE),
                        );
                    });
            });
    }

    fn show_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("connection_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Sensor feed");
                let edit = ui.add(
                    egui::TextEdit::singleline(&mut self.server_url)
                        .desired_width(260.0)
                        .hint_text("http://host:5000"),
                );
                let submitted = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                if ui.button("Connect").clicked() || submitted {
                    self.connect();
                }
                if ui
                    .add_enabled(self.session_active, egui::Button::new("Disconnect"))
                    .clicked()
                {
                    self.disconnect();
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let (label, color) = connection_badge(self.view.connection);
                    ui.label(egui::RichText::new(label).color(color).strong());
                });
            });
        });
    }

    fn show_status_line(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_line").show(ctx, |ui| {
            if let Some(banner) = self.status_banner.clone() {
                egui::Frame::NONE
                    .fill(egui::Color32::from_rgb(111, 53, 53))
                    .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(175, 96, 96)))
                    .corner_radius(8.0)
                    .inner_margin(egui::Margin::symmetric(10, 8))
                    .show(ui, |ui| {
                        ui.horizontal_wrapped(|ui| {
                            ui.label(
                                egui::RichText::new(format!("{}: {}", banner.label(), banner.message()))
                                    .color(egui::Color32::WHITE),
                            );
                            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                                if ui.button("Dismiss").clicked() {
                                    self.status_banner = None;
                                }
                            });
                        });
                    });
            } else {
                ui.small(egui::RichText::new(&self.status).weak());
            }
        });
    }

    fn show_dashboard(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading(egui::RichText::new("🚗 Pedal State Monitor").size(28.0));
                    ui.add_space(8.0);
                    show_gauge(ui, self.view.needle_degrees, self.view.angle, GaugeColors::default());
                    ui.add_space(8.0);
                    if let Some(text) = self.view.status_text() {
                        ui.label(egui::RichText::new(text).size(20.0));
                    }
                    ui.add_space(12.0);
                    ui.horizontal(|ui| {
                        let offset = (ui.available_width() - 2.0 * 150.0 - 16.0).max(0.0) / 2.0;
                        ui.add_space(offset);
                        pedal_card(ui, PedalCard::Accelerator, self.view.active_card);
                        ui.add_space(16.0);
                        pedal_card(ui, PedalCard::Brake, self.view.active_card);
                    });
                });

                ui.add_space(24.0);
                ui.heading("📜 Pedal history");
                egui::Grid::new("pedal_history")
                    .num_columns(2)
                    .striped(true)
                    .min_col_width(180.0)
                    .show(ui, |ui| {
                        ui.label(egui::RichText::new("Time").strong());
                        ui.label(egui::RichText::new("Pedal").strong());
                        ui.end_row();
                        for row in &self.view.history_rows {
                            ui.label(&row.time);
                            ui.label(row.card.label());
                            ui.end_row();
                        }
                    });
            });
        });
    }
}

fn connection_badge(status: ConnectionStatus) -> (&'static str, egui::Color32) {
    let color = match status {
        ConnectionStatus::Connected => egui::Color32::from_rgb(87, 242, 135),
        ConnectionStatus::Connecting => egui::Color32::from_rgb(254, 231, 92),
        ConnectionStatus::Disconnected => egui::Color32::from_rgb(237, 66, 69),
    };
    (status.label(), color)
}

fn pedal_card(ui: &mut egui::Ui, card: PedalCard, active: Option<PedalCard>) {
    let is_active = active == Some(card);
    let fill = match (card, is_active) {
        (PedalCard::Accelerator, true) => ACCEL_ACTIVE,
        (PedalCard::Brake, true) => BRAKE_ACTIVE,
        (_, false) => CARD_IDLE,
    };
    egui::Frame::NONE
        .fill(fill)
        .corner_radius(12.0)
        .inner_margin(egui::Margin::symmetric(20, 16))
        .show(ui, |ui| {
            ui.set_min_size(egui::vec2(110.0, 40.0));
            ui.centered_and_justified(|ui| {
                let text = egui::RichText::new(card.label()).size(20.0).strong();
                ui.label(if is_active {
                    text.color(egui::Color32::WHITE)
                } else {
                    text.weak()
                });
            });
        });
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        self.show_top_bar(ctx);
        self.show_status_line(ctx);
        self.show_dashboard(ctx);
        self.show_alert_overlay(ctx);

        if self.view.alert_visible {
            ctx.request_repaint_after(std::time::Duration::from_millis(16));
        } else {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let settings = PersistedDashboardSettings {
            server_url: self.server_url.clone(),
        };
        if let Ok(serialized) = serde_json::to_string(&settings) {
            storage.set_string(SETTINGS_STORAGE_KEY, serialized);
        }
    }
}
