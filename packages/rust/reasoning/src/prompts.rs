//! Instructions sent alongside every chunk.

/// System message establishing the reviewer persona.
pub const SYSTEM_INSTRUCTION: &str = "Ты — юридический эксперт по законодательству Казахстана. \
Анализируй документы и давай развернутые ответы с конкретными ссылками на законы.";

/// Placeholder replaced by the chunk text in [`ANALYSIS_TEMPLATE`].
const DOCUMENT_PLACEHOLDER: &str = "{document}";

/// Structured risk-analysis request. The reply sections are fixed so that
/// per-chunk results read consistently once joined.
pub const ANALYSIS_TEMPLATE: &str = r#"Проанализируй следующий юридический документ на соответствие законодательству Казахстана.

В ответе придерживайся следующей структуры:

### Правовые риски

1. [Название риска]
   - Описание: [подробное описание]
   - Нормативный акт: [закон/статья]
   - Уровень риска: [высокий/средний/низкий]
   - Рекомендация: [предложение по исправлению]

### Неясные формулировки

1. [Формулировка]
   - Проблема: [в чем неясность]
   - Рекомендация: [как переформулировать]
   - Уровень важности: [высокий/средний/низкий]

### Возможные нарушения

1. [Описание нарушения]
   - Нормативный акт: [закон/статья]
   - Последствия: [возможные санкции]
   - Рекомендация: [как избежать]

### Рекомендации

[Список конкретных рекомендаций по исправлению документа]

### Заключение

[Общая сводка по документу с выводами]

Документ:
{document}"#;

/// Render the user message for one chunk.
pub fn user_prompt(chunk: &str) -> String {
    ANALYSIS_TEMPLATE.replacen(DOCUMENT_PLACEHOLDER, chunk, 1)
}
