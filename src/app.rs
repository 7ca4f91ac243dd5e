// ============================================================================
// Structure : App
// ============================================================================
// Gère l'état global de l'application TUI
//
// PATTERN : "Application State"
// - Tous les composants de l'UI lisent depuis App
// - Toutes les modifications passent par les méthodes de App
// - App ne fait aucune I/O : les requêtes et l'écriture des settings
//   sont pilotées par main.rs à partir de ce que App retourne
// ============================================================================

use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info};

use crate::models::{alarm_lines, Alarm, AlarmHit, ChartRange, PriceGrid, PriceReply, PriceSeries};
use crate::settings::{self, Settings, DEFAULT_COIN, DEFAULT_CURRENCY};

/// Durée d'affichage d'une notification d'alarme
pub const NOTIFICATION_LIFETIME: Duration = Duration::from_millis(7000);

/// Bornes de la position de l'overlay
const POSITION_LIMIT: i32 = 10_000;

// ============================================================================
// Enums : écrans, menu, champs du formulaire
// ============================================================================

/// Écrans de l'application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Overlay des prix (vue principale)
    Overlay,

    /// Menu : Show / Hide / Settings / Quit
    Menu,

    /// Formulaire des settings
    Settings,

    /// Graphique historique du premier coin / première devise
    Chart,
}

/// Entrées du menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    ShowOverlay,
    HideOverlay,
    Settings,
    Quit,
}

impl MenuItem {
    pub const ALL: [MenuItem; 4] = [
        MenuItem::ShowOverlay,
        MenuItem::HideOverlay,
        MenuItem::Settings,
        MenuItem::Quit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MenuItem::ShowOverlay => "Show Overlay",
            MenuItem::HideOverlay => "Hide Overlay",
            MenuItem::Settings => "Settings",
            MenuItem::Quit => "Quit",
        }
    }
}

/// Champs du formulaire des settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Coins,
    Currencies,
    Refresh,
    PositionX,
    PositionY,
    Alarms,
    ShowChanges,
}

impl SettingsField {
    pub const ALL: [SettingsField; 7] = [
        SettingsField::Coins,
        SettingsField::Currencies,
        SettingsField::Refresh,
        SettingsField::PositionX,
        SettingsField::PositionY,
        SettingsField::Alarms,
        SettingsField::ShowChanges,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SettingsField::Coins => "Coins (comma):",
            SettingsField::Currencies => "Vs Currencies (comma):",
            SettingsField::Refresh => "Refresh (ms):",
            SettingsField::PositionX => "Overlay X:",
            SettingsField::PositionY => "Overlay Y:",
            SettingsField::Alarms => "Alarms (coin,currency,threshold; ...):",
            SettingsField::ShowChanges => "Show % changes:",
        }
    }
}

// ============================================================================
// Requêtes produites par App
// ============================================================================

/// Endpoint utilisé pour les prix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    /// /coins/markets : prix + variations
    Markets,
    /// /simple/price : prix seuls
    Simple,
}

/// Une requête de prix (une par devise)
///
/// La requête revient avec sa réponse : la grille sait ainsi quels coins
/// ont été demandés et par quel rafraîchissement
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRequest {
    pub currency: String,
    pub coins: Vec<String>,
    pub source: PriceSource,
    /// Numéro du rafraîchissement (croissant, commence à 1)
    pub sequence: u64,
}

/// Une requête de graphique
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRequest {
    pub coin: String,
    pub currency: String,
    pub days: u32,
}

/// Notification affichée à l'écran
#[derive(Debug, Clone)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub expires_at: Instant,
}

// ============================================================================
// Formulaire des settings
// ============================================================================

/// Valeurs texte du formulaire, éditées champ par champ
///
/// CONCEPT : Formulaire "brouillon"
/// - Le formulaire est une copie texte des settings
/// - Rien n'est appliqué tant que l'utilisateur ne fait pas Apply
#[derive(Debug, Clone, Default)]
pub struct SettingsForm {
    pub coins: String,
    pub vs: String,
    pub refresh: String,
    pub posx: String,
    pub posy: String,
    /// Alarmes séparées par ';' (une ligne par alarme une fois appliquées)
    pub alarms: String,
    pub show_changes: bool,

    /// Index du champ sélectionné
    pub selected: usize,
    /// Buffer du champ en cours d'édition (None : pas d'édition)
    pub editing: Option<String>,
}

impl SettingsForm {
    /// Les alarmes sont relues depuis les settings : seules les lignes
    /// valides reviennent dans le formulaire, normalisées
    pub fn from_settings(settings: &Settings) -> Self {
        let alarms = alarm_lines(&settings.alarm_list());

        Self {
            coins: settings.coins.clone(),
            vs: settings.vs.clone(),
            refresh: settings.refresh_ms().to_string(),
            posx: settings.posx.to_string(),
            posy: settings.posy.to_string(),
            alarms: alarms.join("; "),
            show_changes: settings.show_changes,
            selected: 0,
            editing: None,
        }
    }

    pub fn selected_field(&self) -> SettingsField {
        SettingsField::ALL[self.selected.min(SettingsField::ALL.len() - 1)]
    }

    /// Valeur affichée d'un champ
    pub fn value(&self, field: SettingsField) -> String {
        match field {
            SettingsField::Coins => self.coins.clone(),
            SettingsField::Currencies => self.vs.clone(),
            SettingsField::Refresh => self.refresh.clone(),
            SettingsField::PositionX => self.posx.clone(),
            SettingsField::PositionY => self.posy.clone(),
            SettingsField::Alarms => self.alarms.clone(),
            SettingsField::ShowChanges => (if self.show_changes { "yes" } else { "no" }).to_string(),
        }
    }

    fn field_mut(&mut self, field: SettingsField) -> Option<&mut String> {
        match field {
            SettingsField::Coins => Some(&mut self.coins),
            SettingsField::Currencies => Some(&mut self.vs),
            SettingsField::Refresh => Some(&mut self.refresh),
            SettingsField::PositionX => Some(&mut self.posx),
            SettingsField::PositionY => Some(&mut self.posy),
            SettingsField::Alarms => Some(&mut self.alarms),
            SettingsField::ShowChanges => None,
        }
    }

    /// Convertit le formulaire en Settings
    ///
    /// Les champs numériques invalides sont refusés avec un message
    pub fn to_settings(&self, chart_days: u32) -> Result<Settings, String> {
        let refresh = self
            .refresh
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("Refresh must be a number of milliseconds, got '{}'", self.refresh.trim()))?;
        let posx = parse_position(&self.posx, "Overlay X")?;
        let posy = parse_position(&self.posy, "Overlay Y")?;

        let coins = settings::parse_id_list(&self.coins, DEFAULT_COIN).join(",");
        let vs = settings::parse_id_list(&self.vs, DEFAULT_CURRENCY).join(",");
        let alarms: Vec<&str> = self
            .alarms
            .split(';')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        Ok(Settings {
            coins,
            vs,
            refresh: settings::clamp_refresh(refresh),
            posx,
            posy,
            alarms: alarms.join("\n"),
            show_changes: self.show_changes,
            chart_days,
        })
    }
}

fn parse_position(text: &str, name: &str) -> Result<i32, String> {
    text.trim()
        .parse::<i32>()
        .map(|value| value.clamp(-POSITION_LIMIT, POSITION_LIMIT))
        .map_err(|_| format!("{} must be an integer, got '{}'", name, text.trim()))
}

// ============================================================================
// App
// ============================================================================

/// État principal de l'application
pub struct App {
    /// Indique si l'application doit continuer à tourner
    pub running: bool,

    /// Écran actuellement affiché
    pub current_screen: Screen,

    /// Grille coin × devise
    pub grid: PriceGrid,

    /// Alarmes actives
    pub alarms: Vec<Alarm>,

    /// Settings actuellement appliqués
    pub settings: Settings,

    /// Overlay visible (Show / Hide du menu)
    pub overlay_visible: bool,

    /// Dernier rafraîchissement lancé (None : rafraîchir au prochain tour)
    pub last_refresh: Option<Instant>,

    /// Nombre de requêtes de prix en vol
    pub pending_requests: usize,

    /// Numéro du dernier rafraîchissement lancé
    pub refresh_sequence: u64,

    /// Plage du graphique
    pub chart_range: ChartRange,

    /// Dernière série reçue (None : jamais chargée)
    pub chart: Option<PriceSeries>,

    /// Un graphique est en cours de chargement
    pub chart_loading: bool,

    /// Notifications d'alarme à l'écran
    pub notifications: Vec<Notification>,

    /// Message de statut (erreurs de saisie, "Settings saved", ...)
    pub status_message: Option<String>,

    /// Index sélectionné dans le menu
    pub menu_index: usize,

    /// Formulaire des settings
    pub form: SettingsForm,

    /// Two-step quit : première pression de 'q'
    pub confirm_quit: bool,
}

impl App {
    /// Crée l'application depuis les settings chargés
    pub fn from_settings(settings: Settings) -> Self {
        let grid = PriceGrid::new(settings.coin_list(), settings.currency_list());
        Self {
            running: true,
            current_screen: Screen::Overlay,
            grid,
            alarms: settings.alarm_list(),
            chart_range: settings.chart_range(),
            form: SettingsForm::from_settings(&settings),
            settings,
            overlay_visible: true,
            last_refresh: None,
            pending_requests: 0,
            refresh_sequence: 0,
            chart: None,
            chart_loading: false,
            notifications: Vec::new(),
            status_message: None,
            menu_index: 0,
            confirm_quit: false,
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Tick : retire les notifications expirées
    pub fn tick(&mut self, now: Instant) {
        self.notifications.retain(|n| n.expires_at > now);
    }

    // ========================================================================
    // Rafraîchissement des prix
    // ========================================================================

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.settings.refresh_ms())
    }

    /// Vérifie si un rafraîchissement est dû
    pub fn refresh_due(&self, now: Instant) -> bool {
        match self.last_refresh {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.refresh_interval(),
        }
    }

    /// Force un rafraîchissement au prochain tour de boucle
    pub fn request_refresh(&mut self) {
        self.last_refresh = None;
    }

    /// Démarre un rafraîchissement : une requête par devise
    pub fn start_refresh(&mut self, now: Instant) -> Vec<PriceRequest> {
        self.last_refresh = Some(now);
        self.refresh_sequence += 1;
        let sequence = self.refresh_sequence;

        let source = if self.settings.show_changes {
            PriceSource::Markets
        } else {
            PriceSource::Simple
        };
        let coins = self.grid.coins().to_vec();

        let requests: Vec<PriceRequest> = self
            .grid
            .refresh_targets()
            .into_iter()
            .map(|currency| PriceRequest {
                currency,
                coins: coins.clone(),
                source,
                sequence,
            })
            .collect();

        self.pending_requests += requests.len();
        debug!(requests = requests.len(), sequence, "Starting price refresh");
        requests
    }

    /// Applique une réponse de prix et notifie les alarmes déclenchées
    pub fn apply_price_reply(&mut self, request: &PriceRequest, reply: Result<PriceReply>, now: Instant) -> Vec<AlarmHit> {
        self.pending_requests = self.pending_requests.saturating_sub(1);

        let hits = self
            .grid
            .apply_reply(&request.currency, request.sequence, &request.coins, reply, &self.alarms);
        for hit in &hits {
            info!(coin = %hit.coin, currency = %hit.currency, price = hit.price, threshold = hit.threshold, "Price alarm triggered");
            self.notify("Price Alarm", hit.message(), now);
        }
        hits
    }

    pub fn notify(&mut self, title: &str, message: String, now: Instant) {
        self.notifications.push(Notification {
            title: title.to_string(),
            message,
            expires_at: now + NOTIFICATION_LIFETIME,
        });
    }

    pub fn is_refreshing(&self) -> bool {
        self.pending_requests > 0
    }

    // ========================================================================
    // Graphique
    // ========================================================================

    /// Requête pour le premier coin / la première devise
    pub fn chart_request(&mut self) -> Option<ChartRequest> {
        let coin = self.grid.coins().first()?.clone();
        let currency = self.grid.currencies().first()?.clone();
        self.chart_loading = true;

        Some(ChartRequest {
            coin,
            currency,
            days: self.chart_range.days(),
        })
    }

    /// Série reçue (vide en cas d'échec)
    pub fn set_chart(&mut self, series: PriceSeries) {
        self.chart_loading = false;
        self.chart = Some(series);
    }

    pub fn show_chart(&mut self) {
        self.current_screen = Screen::Chart;
    }

    pub fn next_chart_range(&mut self) {
        self.chart_range = self.chart_range.next();
        self.settings.chart_days = self.chart_range.days();
    }

    pub fn previous_chart_range(&mut self) {
        self.chart_range = self.chart_range.previous();
        self.settings.chart_days = self.chart_range.days();
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn show_overlay_screen(&mut self) {
        self.current_screen = Screen::Overlay;
    }

    pub fn is_on(&self, screen: Screen) -> bool {
        self.current_screen == screen
    }

    pub fn open_menu(&mut self) {
        self.menu_index = 0;
        self.current_screen = Screen::Menu;
    }

    pub fn menu_up(&mut self) {
        self.menu_index = self.menu_index.saturating_sub(1);
    }

    pub fn menu_down(&mut self) {
        self.menu_index = (self.menu_index + 1).min(MenuItem::ALL.len() - 1);
    }

    pub fn selected_menu_item(&self) -> MenuItem {
        MenuItem::ALL[self.menu_index.min(MenuItem::ALL.len() - 1)]
    }

    /// Exécute l'entrée sélectionnée du menu
    pub fn activate_menu(&mut self) {
        match self.selected_menu_item() {
            MenuItem::ShowOverlay => {
                self.overlay_visible = true;
                self.show_overlay_screen();
            }
            MenuItem::HideOverlay => {
                self.overlay_visible = false;
                self.show_overlay_screen();
            }
            MenuItem::Settings => self.open_settings(),
            MenuItem::Quit => self.quit(),
        }
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Ouvre le formulaire, rempli depuis les settings appliqués
    pub fn open_settings(&mut self) {
        self.form = SettingsForm::from_settings(&self.settings);
        self.current_screen = Screen::Settings;
    }

    pub fn is_editing_field(&self) -> bool {
        self.is_on(Screen::Settings) && self.form.editing.is_some()
    }

    pub fn form_up(&mut self) {
        self.form.selected = self.form.selected.saturating_sub(1);
    }

    pub fn form_down(&mut self) {
        self.form.selected = (self.form.selected + 1).min(SettingsField::ALL.len() - 1);
    }

    /// Entrée sur un champ : édition (ou bascule pour un booléen)
    pub fn start_field_edit(&mut self) {
        let field = self.form.selected_field();
        if field == SettingsField::ShowChanges {
            self.form.show_changes = !self.form.show_changes;
            return;
        }
        self.form.editing = Some(self.form.value(field));
    }

    pub fn append_char(&mut self, c: char) {
        if let Some(buffer) = self.form.editing.as_mut() {
            buffer.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(buffer) = self.form.editing.as_mut() {
            buffer.pop();
        }
    }

    /// Valide le champ en cours d'édition
    pub fn commit_field_edit(&mut self) {
        let field = self.form.selected_field();
        if let Some(buffer) = self.form.editing.take() {
            if let Some(value) = self.form.field_mut(field) {
                *value = buffer;
            }
        }
    }

    pub fn cancel_field_edit(&mut self) {
        self.form.editing = None;
    }

    /// Applique le formulaire
    ///
    /// - Reconstruit la grille (toutes les cases repassent en attente)
    /// - Remplace alarmes, intervalle, position
    /// - Demande un rafraîchissement immédiat
    ///
    /// Retourne les settings à persister, None si le formulaire est invalide
    pub fn apply_settings(&mut self) -> Option<Settings> {
        let settings = match self.form.to_settings(self.chart_range.days()) {
            Ok(settings) => settings,
            Err(message) => {
                self.status_message = Some(message);
                return None;
            }
        };

        self.grid.set_coins(settings.coin_list());
        self.grid.set_currencies(settings.currency_list());
        self.alarms = settings.alarm_list();
        self.form = SettingsForm {
            selected: self.form.selected,
            ..SettingsForm::from_settings(&settings)
        };
        self.settings = settings.clone();
        self.request_refresh();

        info!(
            coins = self.grid.coins().len(),
            currencies = self.grid.currencies().len(),
            alarms = self.alarms.len(),
            refresh_ms = self.settings.refresh_ms(),
            "Settings applied"
        );
        Some(settings)
    }

    pub fn overlay_position(&self) -> (i32, i32) {
        (self.settings.posx, self.settings.posy)
    }

    // ========================================================================
    // Quit confirmation
    // ========================================================================

    pub fn request_quit(&mut self) {
        self.confirm_quit = true;
    }

    pub fn cancel_quit(&mut self) {
        self.confirm_quit = false;
    }

    pub fn is_awaiting_quit_confirmation(&self) -> bool {
        self.confirm_quit
    }
}

impl Default for App {
    fn default() -> Self {
        Self::from_settings(Settings::default())
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
