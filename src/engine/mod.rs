//! Conversation engine: the per-user state machine.
//!
//! One inbound event maps, through an explicit `(state, event)` transition
//! table, to a next state plus zero or more outbound response descriptors.
//! Event kinds a state does not accept are explicit no-ops. Collaborator
//! failures (resolver, store) are downgraded at the handler boundary to
//! re-prompts or generic texts; nothing here terminates a session.

pub mod moderation;
pub mod session;

pub use session::{ModelDraft, Session, SessionMap, SessionState};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::chat::{
    Button, InboundEvent, InlineItem, Keyboard, OutboundResponse, UserId, INLINE_PAGE_SIZE,
};
use crate::geo::{CityResolver, Coordinates};
use crate::store::{backup, CatalogStore};

pub const DEPOSIT_MIN: f64 = 100.0;
pub const DEPOSIT_MAX: f64 = 100_000.0;

/// Caption of the reply-keyboard button that switches to typed city entry.
const MANUAL_CITY_CAPTION: &str = "🏙 Ввести город вручную";

/// Callback tokens only the administrator may use.
const ADMIN_TOKENS: [&str; 5] = ["add_model", "delete_model", "stats", "backup", "back_admin"];

/// Result of one conversation turn.
#[derive(Debug)]
pub struct Step {
    pub state: SessionState,
    pub responses: Vec<OutboundResponse>,
}

impl Step {
    fn go(state: SessionState, responses: Vec<OutboundResponse>) -> Self {
        Self { state, responses }
    }

    /// Explicit no-op: the current state does not accept this event.
    fn ignore(state: SessionState) -> Self {
        Self { state, responses: Vec::new() }
    }
}

pub struct ConversationEngine {
    sessions: SessionMap,
    resolver: Arc<CityResolver>,
    store: Arc<CatalogStore>,
    admin_id: UserId,
    backup_dir: PathBuf,
}

impl ConversationEngine {
    pub fn new(
        resolver: Arc<CityResolver>,
        store: Arc<CatalogStore>,
        admin_id: UserId,
        backup_dir: PathBuf,
    ) -> Self {
        Self {
            sessions: SessionMap::new(),
            resolver,
            store,
            admin_id,
            backup_dir,
        }
    }

    /// Handle one inbound event for one user. The session lock is held for
    /// the whole turn, so events for the same user serialize while distinct
    /// users proceed concurrently.
    pub async fn handle_event(&self, user_id: UserId, event: InboundEvent) -> Step {
        let cell = self.sessions.entry(user_id);
        let mut session = cell.lock().await;
        let step = self.dispatch(user_id, &mut session, event).await;
        session.state = step.state;
        step
    }

    async fn dispatch(&self, user_id: UserId, session: &mut Session, event: InboundEvent) -> Step {
        // Commands and the welcome button work from any state.
        match &event {
            InboundEvent::Text { text } if text.trim() == "/start" => {
                return self.start(user_id).await;
            }
            InboundEvent::Text { text } if text.trim() == "/admin" => {
                return self.admin_panel(user_id);
            }
            InboundEvent::Button { token } if token == "continue" => {
                return ask_city();
            }
            _ => {}
        }

        match (session.state, event) {
            (SessionState::SelectCity, InboundEvent::Location { lat, lon }) => {
                self.resolve_location(session, Coordinates { lat, lon }).await
            }
            (SessionState::SelectCity, InboundEvent::Button { token })
                if token == "manual_city" =>
            {
                Step::go(
                    SessionState::ManualCityInput,
                    vec![OutboundResponse::text("Введите город:")],
                )
            }
            (
                SessionState::SelectCity | SessionState::ManualCityInput,
                InboundEvent::Text { text },
            ) => self.city_text(session, text.trim()).await,
            (SessionState::ConfirmCity, InboundEvent::Button { token }) => {
                self.confirm_city_button(user_id, session, &token).await
            }
            (SessionState::MainMenu, InboundEvent::Button { token }) => {
                self.main_menu_button(user_id, &token).await
            }
            (SessionState::MainMenu, InboundEvent::InlineQuery { offset, .. }) => {
                self.inline_search(user_id, offset).await
            }
            (SessionState::DepositAmount, InboundEvent::Text { text }) => {
                self.deposit(user_id, text.trim()).await
            }
            (SessionState::DepositAmount, InboundEvent::Button { token }) if token == "back" => {
                Step::go(SessionState::MainMenu, vec![main_menu()])
            }
            (SessionState::GetModelData, InboundEvent::Text { text }) => {
                draft_input(session, &text)
            }
            (SessionState::GetModelPhoto, InboundEvent::Photo { file_ref }) => {
                self.save_model(session, &file_ref).await
            }
            (SessionState::ConfirmDeleteModel, InboundEvent::Button { token }) => {
                self.delete_button(session, &token).await
            }
            // The current state does not accept this event kind.
            (state, _) => Step::ignore(state),
        }
    }

    // ─── Entry points ───────────────────────────────────────────

    async fn start(&self, user_id: UserId) -> Step {
        if let Err(e) = self.store.ensure_user(user_id).await {
            warn!(user = user_id, error = %e, "failed to create user row");
        }
        let keyboard = Keyboard::column(vec![Button::new("Продолжить", "continue")]);
        Step::go(
            SessionState::SelectCity,
            vec![OutboundResponse::Photo {
                image_ref: "welcome.jpg".into(),
                caption: "Добро пожаловать!\n\nПользуясь нашим бот-каталогом, вы соглашаетесь с правилами сервиса.".into(),
                keyboard: Some(keyboard),
            }],
        )
    }

    /// Moderation entry point, gated by exact identity match.
    fn admin_panel(&self, user_id: UserId) -> Step {
        if user_id != self.admin_id {
            warn!(user = user_id, "moderation access denied");
            return Step::go(
                SessionState::MainMenu,
                vec![OutboundResponse::text("🚫 Доступ запрещён!")],
            );
        }
        Step::go(SessionState::MainMenu, vec![admin_menu_prompt()])
    }

    // ─── City selection ─────────────────────────────────────────

    async fn resolve_location(&self, session: &mut Session, coords: Coordinates) -> Step {
        match self.resolver.reverse_resolve(coords).await {
            Some(city) => confirm_city_prompt(session, city),
            None => Step::go(
                SessionState::ManualCityInput,
                vec![OutboundResponse::text(
                    "❌ Не удалось определить город. Попробуйте ввести вручную.",
                )],
            ),
        }
    }

    async fn city_text(&self, session: &mut Session, text: &str) -> Step {
        if text == MANUAL_CITY_CAPTION {
            return Step::go(
                SessionState::ManualCityInput,
                vec![OutboundResponse::text("Введите город:")],
            );
        }
        if !text.is_empty() && self.resolver.validate(text).await {
            confirm_city_prompt(session, text.to_string())
        } else {
            Step::go(
                SessionState::ManualCityInput,
                vec![OutboundResponse::text(
                    "Не удалось найти такой город. Попробуйте ещё раз:",
                )],
            )
        }
    }

    async fn confirm_city_button(
        &self,
        user_id: UserId,
        session: &mut Session,
        token: &str,
    ) -> Step {
        match token {
            "confirm_city" => {
                let Some(city) = session.pending_city.take() else {
                    return ask_city();
                };
                let canonical = city.to_lowercase();
                if let Err(e) = self.store.set_city(user_id, &canonical).await {
                    error!(user = user_id, error = %e, "failed to persist city");
                    session.pending_city = Some(city);
                    return Step::go(
                        SessionState::ConfirmCity,
                        vec![OutboundResponse::text(
                            "⚠️ Не удалось сохранить город. Попробуйте ещё раз.",
                        )],
                    );
                }
                info!(user = user_id, city = canonical, "city confirmed");
                Step::go(SessionState::MainMenu, vec![main_menu()])
            }
            "change_city" => {
                session.pending_city = None;
                ask_city()
            }
            _ => Step::ignore(SessionState::ConfirmCity),
        }
    }

    // ─── Main menu ──────────────────────────────────────────────

    async fn main_menu_button(&self, user_id: UserId, token: &str) -> Step {
        if ADMIN_TOKENS.contains(&token) && user_id != self.admin_id {
            warn!(user = user_id, token, "moderation button from non-admin");
            return Step::go(
                SessionState::MainMenu,
                vec![OutboundResponse::text("🚫 Доступ запрещён!")],
            );
        }

        match token {
            "my_account" => self.account_menu(user_id).await,
            "deposit_card" => Step::go(
                SessionState::DepositAmount,
                vec![OutboundResponse::text(
                    "Введите сумму для пополнения (от 100 до 100 000 ₽):",
                )],
            ),
            "orders_history" => self.orders_history(user_id).await,
            "back" => Step::go(SessionState::MainMenu, vec![main_menu()]),
            "search" => Step::go(
                SessionState::MainMenu,
                vec![OutboundResponse::text("Введите запрос в строке поиска.")],
            ),
            "add_model" => Step::go(
                SessionState::GetModelData,
                vec![OutboundResponse::text(
                    "Введите данные модели в формате:\nИмя | Возраст | Город | Цена\nПример: Анна | 25 | Москва | 5000",
                )],
            ),
            "delete_model" => self.delete_selection().await,
            "stats" => self.stats().await,
            "backup" => self.on_demand_backup().await,
            "back_admin" => Step::go(SessionState::MainMenu, vec![admin_menu_prompt()]),
            _ => Step::ignore(SessionState::MainMenu),
        }
    }

    async fn account_menu(&self, user_id: UserId) -> Step {
        let balance = match self.store.balance_minor(user_id).await {
            Ok(minor) => minor,
            Err(e) => {
                error!(user = user_id, error = %e, "failed to read balance");
                return Step::go(
                    SessionState::MainMenu,
                    vec![OutboundResponse::text("⚠️ Не удалось загрузить аккаунт.")],
                );
            }
        };
        let keyboard = Keyboard::column(vec![
            Button::new("💰 Пополнить баланс", "deposit_card"),
            Button::new("📖 История заказов", "orders_history"),
            Button::new("🔙 Назад", "back"),
        ]);
        Step::go(
            SessionState::MainMenu,
            vec![OutboundResponse::menu(
                format!("Ваш баланс: {:.2}₽\nВыберите действие:", rubles(balance)),
                keyboard,
            )],
        )
    }

    async fn orders_history(&self, user_id: UserId) -> Step {
        let orders = match self.store.orders_for_user(user_id).await {
            Ok(orders) => orders,
            Err(e) => {
                error!(user = user_id, error = %e, "failed to load orders");
                return Step::go(
                    SessionState::MainMenu,
                    vec![OutboundResponse::text("⚠️ Не удалось загрузить историю заказов.")],
                );
            }
        };
        let text = if orders.is_empty() {
            "У вас пока нет заказов.".to_string()
        } else {
            orders
                .iter()
                .map(|o| {
                    format!(
                        "№{}: модель {}, {} ч, {:.2}₽ ({})",
                        o.id,
                        o.model_id,
                        o.hours,
                        rubles(o.total),
                        o.status
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        Step::go(SessionState::MainMenu, vec![OutboundResponse::text(text)])
    }

    async fn inline_search(&self, user_id: UserId, offset: i64) -> Step {
        let city = match self.store.user(user_id).await {
            Ok(user) => user.and_then(|u| u.city),
            Err(e) => {
                error!(user = user_id, error = %e, "inline query user lookup failed");
                None
            }
        };
        let Some(city) = city else {
            return Step::go(
                SessionState::MainMenu,
                vec![OutboundResponse::InlineResults { items: vec![], next_offset: None }],
            );
        };

        let models = match self.store.models_in_city(&city, INLINE_PAGE_SIZE, offset).await {
            Ok(models) => models,
            Err(e) => {
                error!(user = user_id, error = %e, "inline query catalog lookup failed");
                Vec::new()
            }
        };

        let items: Vec<InlineItem> = models
            .iter()
            .map(|m| InlineItem {
                id: m.id.to_string(),
                title: m.name.clone(),
                message: format!("{} · {} · {}", m.name, m.age, m.city),
                description: format!("Стоимость: {}₽", m.price),
                thumb_ref: m.photo_ref.clone(),
            })
            .collect();

        let next_offset =
            (items.len() as i64 == INLINE_PAGE_SIZE).then(|| offset + INLINE_PAGE_SIZE);
        Step::go(
            SessionState::MainMenu,
            vec![OutboundResponse::InlineResults { items, next_offset }],
        )
    }

    // ─── Deposits ───────────────────────────────────────────────

    async fn deposit(&self, user_id: UserId, text: &str) -> Step {
        let Some(minor) = parse_deposit_amount(text) else {
            return Step::go(
                SessionState::DepositAmount,
                vec![OutboundResponse::text(
                    "❌ Некорректная сумма. Введите число от 100 до 100 000:",
                )],
            );
        };

        if let Err(e) = self.store.credit_balance(user_id, minor).await {
            error!(user = user_id, error = %e, "failed to credit balance");
            return Step::go(
                SessionState::DepositAmount,
                vec![OutboundResponse::text("⚠️ Не удалось пополнить баланс. Попробуйте позже.")],
            );
        }

        let new_balance = self.store.balance_minor(user_id).await.unwrap_or(minor);
        info!(user = user_id, credited = minor, "balance credited");
        Step::go(
            SessionState::MainMenu,
            vec![OutboundResponse::text(format!(
                "✅ Баланс успешно пополнен на {:.2}₽\nНовый баланс: {:.2}₽",
                rubles(minor),
                rubles(new_balance)
            ))],
        )
    }

    // ─── Moderation flow ────────────────────────────────────────

    async fn save_model(&self, session: &mut Session, file_ref: &str) -> Step {
        // The draft is cleared whether or not persistence succeeds.
        let Some(draft) = session.pending_draft.take() else {
            return Step::go(
                SessionState::MainMenu,
                vec![OutboundResponse::text("Сначала введите данные модели.")],
            );
        };

        match self
            .store
            .insert_model(&draft.name, draft.age, &draft.city, file_ref, draft.price)
            .await
        {
            Ok(id) => {
                info!(model = id, name = draft.name, "catalog model added");
                Step::go(
                    SessionState::MainMenu,
                    vec![OutboundResponse::text("Модель успешно добавлена!")],
                )
            }
            Err(e) => {
                error!(error = %e, "failed to persist catalog model");
                Step::go(
                    SessionState::MainMenu,
                    vec![OutboundResponse::text("Ошибка сохранения модели!")],
                )
            }
        }
    }

    async fn delete_selection(&self) -> Step {
        match self.store.list_models(moderation::MAX_DELETE_LIST).await {
            Ok(models) => Step::go(
                SessionState::ConfirmDeleteModel,
                vec![OutboundResponse::menu(
                    "Выберите модель для удаления:",
                    moderation::delete_list(&models),
                )],
            ),
            Err(e) => {
                error!(error = %e, "failed to list models for deletion");
                Step::go(
                    SessionState::MainMenu,
                    vec![OutboundResponse::text("⚠️ Не удалось загрузить список моделей.")],
                )
            }
        }
    }

    async fn delete_button(&self, session: &mut Session, token: &str) -> Step {
        if let Some(raw_id) = token.strip_prefix("del_") {
            let Ok(id) = raw_id.parse::<i64>() else {
                return Step::ignore(SessionState::ConfirmDeleteModel);
            };
            return match self.store.model(id).await {
                Ok(Some(model)) => {
                    session.pending_delete = Some(id);
                    Step::go(
                        SessionState::ConfirmDeleteModel,
                        vec![OutboundResponse::menu(
                            moderation::model_summary(&model),
                            moderation::confirm_delete_keyboard(),
                        )],
                    )
                }
                Ok(None) => Step::go(
                    SessionState::ConfirmDeleteModel,
                    vec![OutboundResponse::text("Модель не найдена.")],
                ),
                Err(e) => {
                    error!(error = %e, "failed to load model for deletion");
                    Step::go(
                        SessionState::ConfirmDeleteModel,
                        vec![OutboundResponse::text("⚠️ Не удалось загрузить модель.")],
                    )
                }
            };
        }

        match token {
            "confirm_del" => {
                let Some(id) = session.pending_delete.take() else {
                    return self.delete_selection().await;
                };
                match self.store.delete_model(id).await {
                    Ok(()) => {
                        info!(model = id, "catalog model deleted");
                        Step::go(
                            SessionState::MainMenu,
                            vec![
                                OutboundResponse::text("Модель успешно удалена!"),
                                admin_menu_prompt(),
                            ],
                        )
                    }
                    Err(e) => {
                        error!(model = id, error = %e, "failed to delete model");
                        Step::go(
                            SessionState::ConfirmDeleteModel,
                            vec![OutboundResponse::text("⚠️ Не удалось удалить модель.")],
                        )
                    }
                }
            }
            "cancel_del" => {
                session.pending_delete = None;
                self.delete_selection().await
            }
            "back_admin" => Step::go(SessionState::MainMenu, vec![admin_menu_prompt()]),
            _ => Step::ignore(SessionState::ConfirmDeleteModel),
        }
    }

    async fn stats(&self) -> Step {
        match self.store.stats().await {
            Ok(stats) => Step::go(
                SessionState::MainMenu,
                vec![OutboundResponse::text(format!(
                    "📊 Пользователей: {}\nМоделей: {}\nЗаказов: {}",
                    stats.users, stats.models, stats.orders
                ))],
            ),
            Err(e) => {
                error!(error = %e, "failed to collect stats");
                Step::go(
                    SessionState::MainMenu,
                    vec![OutboundResponse::text("⚠️ Не удалось собрать статистику.")],
                )
            }
        }
    }

    async fn on_demand_backup(&self) -> Step {
        match backup::run_backup(&self.store, &self.backup_dir).await {
            Ok(path) => Step::go(
                SessionState::MainMenu,
                vec![OutboundResponse::text(format!(
                    "📦 Резервная копия создана: {}",
                    path.display()
                ))],
            ),
            Err(e) => {
                error!(error = %e, "on-demand backup failed");
                Step::go(
                    SessionState::MainMenu,
                    vec![OutboundResponse::text("⚠️ Не удалось создать резервную копию.")],
                )
            }
        }
    }
}

// ─── Response builders ──────────────────────────────────────────

fn ask_city() -> Step {
    let keyboard = Keyboard::column(vec![
        Button::new("📍 Отправить геопозицию", "share_location"),
        Button::new(MANUAL_CITY_CAPTION, "manual_city"),
    ]);
    Step::go(
        SessionState::SelectCity,
        vec![OutboundResponse::menu(
            "Разрешите доступ к геопозиции или введите город:",
            keyboard,
        )],
    )
}

fn confirm_city_prompt(session: &mut Session, city: String) -> Step {
    let keyboard = Keyboard::column(vec![
        Button::new(format!("✅ Да, город {city}"), "confirm_city"),
        Button::new("🔄 Изменить город", "change_city"),
    ]);
    let prompt = format!("Подтвердите выбор города: {}", capitalize_first(&city));
    session.pending_city = Some(city);
    Step::go(SessionState::ConfirmCity, vec![OutboundResponse::menu(prompt, keyboard)])
}

fn main_menu() -> OutboundResponse {
    OutboundResponse::Photo {
        image_ref: "main_menu.jpg".into(),
        caption: "Главное меню".into(),
        keyboard: Some(Keyboard::column(vec![
            Button::new("Поиск моделей", "search"),
            Button::new("Мой аккаунт", "my_account"),
        ])),
    }
}

fn admin_menu_prompt() -> OutboundResponse {
    OutboundResponse::menu("🛠 Админ-панель:", moderation::admin_menu())
}

fn draft_input(session: &mut Session, text: &str) -> Step {
    match moderation::parse_draft(text) {
        Ok(draft) => {
            session.pending_draft = Some(draft);
            Step::go(
                SessionState::GetModelPhoto,
                vec![OutboundResponse::text("Теперь отправьте фото модели")],
            )
        }
        Err(e) => {
            warn!(error = %e, "rejected model draft");
            Step::go(
                SessionState::GetModelData,
                vec![OutboundResponse::text("Ошибка формата! Попробуйте снова")],
            )
        }
    }
}

/// Parse a deposit amount into integer minor units. Accepts a comma decimal
/// separator; only values in `100..=100000` are accepted.
pub(crate) fn parse_deposit_amount(text: &str) -> Option<i64> {
    let amount: f64 = text.trim().replace(',', ".").parse().ok()?;
    if !(DEPOSIT_MIN..=DEPOSIT_MAX).contains(&amount) {
        return None;
    }
    Some((amount * 100.0).round() as i64)
}

fn rubles(minor: i64) -> f64 {
    minor as f64 / 100.0
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{CityResolver, GeoError, GeoProvider, GeocodeCache};
    use crate::store::test_util::temp_store;
    use async_trait::async_trait;
    use tempfile::TempDir;

    const ADMIN: UserId = 99;

    /// A provider with fixed answers; enough to drive the engine.
    struct StaticProvider {
        reverse_city: Option<String>,
        forward_found: bool,
    }

    #[async_trait]
    impl GeoProvider for StaticProvider {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn reverse(&self, _coords: Coordinates) -> Result<Option<String>, GeoError> {
            Ok(self.reverse_city.clone())
        }

        async fn forward(&self, _name: &str) -> Result<bool, GeoError> {
            Ok(self.forward_found)
        }
    }

    async fn engine_with(
        reverse_city: Option<&str>,
        forward_found: bool,
    ) -> (ConversationEngine, Arc<CatalogStore>, TempDir) {
        let (store, dir) = temp_store().await;
        let store = Arc::new(store);
        let provider = StaticProvider {
            reverse_city: reverse_city.map(str::to_string),
            forward_found,
        };
        let resolver =
            Arc::new(CityResolver::new(GeocodeCache::new(), Box::new(provider), None));
        let engine = ConversationEngine::new(
            resolver,
            store.clone(),
            ADMIN,
            dir.path().join("backups"),
        );
        (engine, store, dir)
    }

    fn text(s: &str) -> InboundEvent {
        InboundEvent::Text { text: s.into() }
    }

    fn button(token: &str) -> InboundEvent {
        InboundEvent::Button { token: token.into() }
    }

    fn location() -> InboundEvent {
        InboundEvent::Location { lat: 55.7558, lon: 37.6176 }
    }

    fn first_text(step: &Step) -> &str {
        match &step.responses[0] {
            OutboundResponse::Text { text } => text,
            OutboundResponse::Menu { text, .. } => text,
            OutboundResponse::Photo { caption, .. } => caption,
            OutboundResponse::InlineResults { .. } => panic!("inline results, not text"),
        }
    }

    /// Walk a user from /start through location confirmation into the menu.
    async fn enter_main_menu(engine: &ConversationEngine, user: UserId) {
        engine.handle_event(user, text("/start")).await;
        engine.handle_event(user, location()).await;
        let step = engine.handle_event(user, button("confirm_city")).await;
        assert_eq!(step.state, SessionState::MainMenu);
    }

    #[tokio::test]
    async fn test_start_then_location_then_confirm() {
        let (engine, store, _dir) = engine_with(Some("Москва"), true).await;

        let step = engine.handle_event(1, text("/start")).await;
        assert_eq!(step.state, SessionState::SelectCity);

        let step = engine.handle_event(1, location()).await;
        assert_eq!(step.state, SessionState::ConfirmCity);
        assert!(first_text(&step).contains("Москва"));

        let step = engine.handle_event(1, button("confirm_city")).await;
        assert_eq!(step.state, SessionState::MainMenu);

        let user = store.user(1).await.unwrap().unwrap();
        assert_eq!(user.city.as_deref(), Some("москва"));
    }

    #[tokio::test]
    async fn test_unresolvable_location_falls_back_to_manual() {
        let (engine, _store, _dir) = engine_with(None, true).await;
        engine.handle_event(1, text("/start")).await;

        let step = engine.handle_event(1, location()).await;
        assert_eq!(step.state, SessionState::ManualCityInput);
        assert!(first_text(&step).contains("вручную"));
    }

    #[tokio::test]
    async fn test_failed_validation_keeps_prompting() {
        let (engine, store, _dir) = engine_with(None, false).await;
        engine.handle_event(1, text("/start")).await;

        let step = engine.handle_event(1, text("Нигдеград")).await;
        assert_eq!(step.state, SessionState::ManualCityInput);

        let step = engine.handle_event(1, text("Нигдеград")).await;
        assert_eq!(step.state, SessionState::ManualCityInput);

        // nothing was persisted
        assert_eq!(store.user(1).await.unwrap().unwrap().city, None);
    }

    #[tokio::test]
    async fn test_manual_entry_button_then_valid_city() {
        let (engine, _store, _dir) = engine_with(None, true).await;
        engine.handle_event(1, text("/start")).await;

        let step = engine.handle_event(1, button("manual_city")).await;
        assert_eq!(step.state, SessionState::ManualCityInput);

        let step = engine.handle_event(1, text("казань")).await;
        assert_eq!(step.state, SessionState::ConfirmCity);
        assert!(first_text(&step).contains("Казань"));
    }

    #[tokio::test]
    async fn test_change_city_restarts_selection() {
        let (engine, store, _dir) = engine_with(Some("Москва"), true).await;
        engine.handle_event(1, text("/start")).await;
        engine.handle_event(1, location()).await;

        let step = engine.handle_event(1, button("change_city")).await;
        assert_eq!(step.state, SessionState::SelectCity);
        assert_eq!(store.user(1).await.unwrap().unwrap().city, None);
    }

    #[tokio::test]
    async fn test_deposit_flow() {
        let (engine, store, _dir) = engine_with(Some("Berlin"), true).await;
        enter_main_menu(&engine, 1).await;

        engine.handle_event(1, button("my_account")).await;
        let step = engine.handle_event(1, button("deposit_card")).await;
        assert_eq!(step.state, SessionState::DepositAmount);

        // below the minimum: rejected, state holds
        let step = engine.handle_event(1, text("99")).await;
        assert_eq!(step.state, SessionState::DepositAmount);
        assert_eq!(store.balance_minor(1).await.unwrap(), 0);

        let step = engine.handle_event(1, text("1500")).await;
        assert_eq!(step.state, SessionState::MainMenu);
        assert!(first_text(&step).contains("1500.00"));
        assert_eq!(store.balance_minor(1).await.unwrap(), 150_000);
    }

    #[test]
    fn test_parse_deposit_amount() {
        assert_eq!(parse_deposit_amount("100"), Some(10_000));
        assert_eq!(parse_deposit_amount("1500"), Some(150_000));
        assert_eq!(parse_deposit_amount("150,50"), Some(15_050));
        assert_eq!(parse_deposit_amount("100000"), Some(10_000_000));
        assert_eq!(parse_deposit_amount("99"), None);
        assert_eq!(parse_deposit_amount("100001"), None);
        assert_eq!(parse_deposit_amount("abc"), None);
        assert_eq!(parse_deposit_amount(""), None);
    }

    #[tokio::test]
    async fn test_non_admin_is_rejected() {
        let (engine, _store, _dir) = engine_with(Some("Москва"), true).await;
        let step = engine.handle_event(1, text("/admin")).await;
        assert_eq!(step.state, SessionState::MainMenu);
        assert!(first_text(&step).contains("Доступ запрещён"));
    }

    #[tokio::test]
    async fn test_admin_add_model_flow() {
        let (engine, store, _dir) = engine_with(Some("Москва"), true).await;

        let step = engine.handle_event(ADMIN, text("/admin")).await;
        assert_eq!(step.state, SessionState::MainMenu);
        assert!(first_text(&step).contains("Админ-панель"));

        let step = engine.handle_event(ADMIN, button("add_model")).await;
        assert_eq!(step.state, SessionState::GetModelData);

        let step = engine.handle_event(ADMIN, text("Анна | 25 | Москва | 5000")).await;
        assert_eq!(step.state, SessionState::GetModelPhoto);

        let step = engine
            .handle_event(ADMIN, InboundEvent::Photo { file_ref: "photo-1".into() })
            .await;
        assert_eq!(step.state, SessionState::MainMenu);
        assert!(first_text(&step).contains("добавлена"));

        let models = store.list_models(10).await.unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "Анна");
        assert_eq!(models[0].photo_ref, "photo-1");
        assert_eq!(models[0].price, 5000);
    }

    #[tokio::test]
    async fn test_invalid_draft_stays_in_data_entry() {
        let (engine, store, _dir) = engine_with(Some("Москва"), true).await;
        engine.handle_event(ADMIN, text("/admin")).await;
        engine.handle_event(ADMIN, button("add_model")).await;

        let step = engine.handle_event(ADMIN, text("Анна | 25 | Москва")).await;
        assert_eq!(step.state, SessionState::GetModelData);
        assert!(store.list_models(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_flow() {
        let (engine, store, _dir) = engine_with(Some("Москва"), true).await;
        let id = store.insert_model("Анна", 25, "Москва", "p", 5000).await.unwrap();

        engine.handle_event(ADMIN, text("/admin")).await;
        let step = engine.handle_event(ADMIN, button("delete_model")).await;
        assert_eq!(step.state, SessionState::ConfirmDeleteModel);

        let step = engine.handle_event(ADMIN, button(&format!("del_{id}"))).await;
        assert_eq!(step.state, SessionState::ConfirmDeleteModel);
        assert!(first_text(&step).contains("Анна"));

        let step = engine.handle_event(ADMIN, button("confirm_del")).await;
        assert_eq!(step.state, SessionState::MainMenu);
        assert!(store.model(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_delete_keeps_model() {
        let (engine, store, _dir) = engine_with(Some("Москва"), true).await;
        let id = store.insert_model("Анна", 25, "Москва", "p", 5000).await.unwrap();

        engine.handle_event(ADMIN, text("/admin")).await;
        engine.handle_event(ADMIN, button("delete_model")).await;
        engine.handle_event(ADMIN, button(&format!("del_{id}"))).await;

        let step = engine.handle_event(ADMIN, button("cancel_del")).await;
        assert_eq!(step.state, SessionState::ConfirmDeleteModel);
        assert!(store.model(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stats_button() {
        let (engine, store, _dir) = engine_with(Some("Москва"), true).await;
        store.ensure_user(1).await.unwrap();

        engine.handle_event(ADMIN, text("/admin")).await;
        let step = engine.handle_event(ADMIN, button("stats")).await;
        assert_eq!(step.state, SessionState::MainMenu);
        assert!(first_text(&step).contains("Пользователей: 1"));
    }

    #[tokio::test]
    async fn test_unexpected_events_are_ignored() {
        let (engine, _store, _dir) = engine_with(Some("Berlin"), true).await;
        enter_main_menu(&engine, 1).await;

        // a photo means nothing in the main menu
        let step = engine
            .handle_event(1, InboundEvent::Photo { file_ref: "x".into() })
            .await;
        assert_eq!(step.state, SessionState::MainMenu);
        assert!(step.responses.is_empty());

        // unknown callback tokens likewise
        let step = engine.handle_event(1, button("no_such_token")).await;
        assert!(step.responses.is_empty());
    }

    #[tokio::test]
    async fn test_inline_pagination() {
        let (engine, store, _dir) = engine_with(Some("Berlin"), true).await;
        enter_main_menu(&engine, 1).await;
        for i in 0..7 {
            store.insert_model(&format!("m{i}"), 20, "Berlin", "p", 100).await.unwrap();
        }

        let step = engine
            .handle_event(1, InboundEvent::InlineQuery { query: String::new(), offset: 0 })
            .await;
        let OutboundResponse::InlineResults { items, next_offset } = &step.responses[0] else {
            panic!("expected inline results");
        };
        assert_eq!(items.len(), 5);
        assert_eq!(*next_offset, Some(5));
        assert_eq!(items[0].title, "m0");
        assert!(items[0].description.contains("100"));

        let step = engine
            .handle_event(1, InboundEvent::InlineQuery { query: String::new(), offset: 5 })
            .await;
        let OutboundResponse::InlineResults { items, next_offset } = &step.responses[0] else {
            panic!("expected inline results");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(*next_offset, None);
    }

    #[tokio::test]
    async fn test_inline_query_with_empty_catalog() {
        let (engine, _store, _dir) = engine_with(Some("Berlin"), true).await;
        enter_main_menu(&engine, 1).await;

        let step = engine
            .handle_event(1, InboundEvent::InlineQuery { query: String::new(), offset: 0 })
            .await;
        let OutboundResponse::InlineResults { items, next_offset } = &step.responses[0] else {
            panic!("expected inline results");
        };
        assert!(items.is_empty());
        assert_eq!(*next_offset, None);
    }

    #[tokio::test]
    async fn test_start_resets_any_state() {
        let (engine, _store, _dir) = engine_with(Some("Berlin"), true).await;
        enter_main_menu(&engine, 1).await;
        engine.handle_event(1, button("my_account")).await;
        engine.handle_event(1, button("deposit_card")).await;

        let step = engine.handle_event(1, text("/start")).await;
        assert_eq!(step.state, SessionState::SelectCity);
    }
}
