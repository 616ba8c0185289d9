//! Record parser for the monthly schedule view
//!
//! Converts one page of markup into typed schedule records plus a
//! continuation signal. The markup contract, recovered from the real view:
//!
//! - each day is a `td.eventcell` holding a `span.date` with `M/D` text
//! - each entry is a `div.eventLink` with an optional
//!   `span.eventDateTime` (`HH:MM-HH:MM`, trailing `&nbsp;`), the title on
//!   `a.event` (the `title` attribute, falling back to the anchor text), an
//!   optional `span.eventFacility` and an optional `span.eventMember`
//! - the event anchor's `sEID` query parameter is the server's event id
//! - a `a.pagerNext` control marks a further page
//!
//! Optional fields that are missing stay empty instead of failing the
//! record; a malformed date or time discards the record with accounting. A
//! page without any event cells is structurally unrecognized: a login-form
//! marker makes it decisively session-expired, otherwise it is reported as
//! possibly expired and the walker treats it as an empty page.

use crate::model::{DateWindow, ScheduleRecord};
use chrono::NaiveTime;
use scraper::{ElementRef, Html, Selector};

/// Whether a parsed page looked authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Recognized schedule markup
    Fresh,

    /// Expected container absent without a login marker; treated as empty page
    PossiblyExpired,

    /// Login-form marker present; the session is gone
    Expired,
}

/// Outcome of one fetch+parse cycle
#[derive(Debug, Clone)]
pub struct PageResult {
    /// Records in page order
    pub records: Vec<ScheduleRecord>,

    /// Next pagination offset, `None` when the window is exhausted
    pub continuation: Option<u32>,

    pub freshness: Freshness,

    /// Records discarded as unparsable on this page
    pub discarded: u32,

    /// Global fetch-order stamp, assigned by the walker
    pub seq: u64,
}

impl PageResult {
    fn unrecognized(freshness: Freshness) -> Self {
        Self {
            records: Vec::new(),
            continuation: None,
            freshness,
            discarded: 0,
            seq: 0,
        }
    }
}

/// Parse context: which window and cursor produced the markup
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub window: DateWindow,

    /// Cursor of the fetched page, used to derive the continuation offset
    pub offset: u32,

    /// Expected records per page; a full page implies more may follow
    pub page_size_hint: u32,

    /// Diagnostic label recorded on every extracted record
    pub source_page: String,
}

/// Returns true when the markup contains the groupware's login form
///
/// Used both to detect session expiry on view pages and to detect a
/// rejected login (the server answers with the form again).
pub fn login_form_present(markup: &str) -> bool {
    let document = Html::parse_document(markup);
    match Selector::parse("select.vr_loginForm, input[name='Password']") {
        Ok(selector) => document.select(&selector).next().is_some(),
        Err(_) => false,
    }
}

/// Parses one monthly-view page into records and a continuation signal
pub fn parse_schedule_page(markup: &str, ctx: &ParseContext) -> PageResult {
    let document = Html::parse_document(markup);

    let cell_selector = match Selector::parse("td.eventcell") {
        Ok(s) => s,
        Err(_) => return PageResult::unrecognized(Freshness::PossiblyExpired),
    };

    let cells: Vec<ElementRef> = document.select(&cell_selector).collect();
    if cells.is_empty() {
        // No schedule grid at all. A login form is decisive evidence of
        // expiry; without one this is reported as a possibly-stale empty
        // page and left to the walker.
        let freshness = if has_login_marker(&document) {
            Freshness::Expired
        } else {
            Freshness::PossiblyExpired
        };
        return PageResult::unrecognized(freshness);
    }

    let mut records = Vec::new();
    let mut discarded = 0u32;

    for cell in &cells {
        parse_event_cell(cell, ctx, &mut records, &mut discarded);
    }

    let continuation = continuation_offset(&document, ctx, records.len() as u32);

    PageResult {
        records,
        continuation,
        freshness: Freshness::Fresh,
        discarded,
        seq: 0,
    }
}

fn has_login_marker(document: &Html) -> bool {
    Selector::parse("select.vr_loginForm, input[name='Password']")
        .map(|s| document.select(&s).next().is_some())
        .unwrap_or(false)
}

/// Extracts every event link of one day cell
fn parse_event_cell(
    cell: &ElementRef,
    ctx: &ParseContext,
    records: &mut Vec<ScheduleRecord>,
    discarded: &mut u32,
) {
    let date_selector = match Selector::parse("span.date") {
        Ok(s) => s,
        Err(_) => return,
    };
    let link_selector = match Selector::parse("div.eventLink") {
        Ok(s) => s,
        Err(_) => return,
    };

    let links: Vec<ElementRef> = cell.select(&link_selector).collect();
    if links.is_empty() {
        return;
    }

    // `span.date` carries `M/D`; the year comes from the window. A cell
    // whose date cannot be resolved discards all of its entries, counted.
    let date = cell
        .select(&date_selector)
        .next()
        .map(|span| span.text().collect::<String>())
        .and_then(|text| parse_cell_date(&text, ctx.window));

    let date = match date {
        Some(d) => d,
        None => {
            tracing::debug!(page = %ctx.source_page, "event cell with unparsable date");
            *discarded += links.len() as u32;
            return;
        }
    };

    for link in links {
        match parse_event_link(&link, date, ctx) {
            Some(record) => records.push(record),
            None => *discarded += 1,
        }
    }
}

/// Parses one `div.eventLink` into a record; `None` means discard
fn parse_event_link(
    link: &ElementRef,
    date: chrono::NaiveDate,
    ctx: &ParseContext,
) -> Option<ScheduleRecord> {
    let anchor_selector = Selector::parse("a.event").ok()?;
    let anchor = link.select(&anchor_selector).next()?;

    let title = anchor
        .value()
        .attr("title")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| anchor.text().collect::<String>().trim().to_string());
    if title.is_empty() {
        return None;
    }

    let (start, end) = match parse_time_range(link) {
        Ok(range) => range,
        Err(()) => {
            tracing::debug!(page = %ctx.source_page, title = %title, "malformed time range");
            return None;
        }
    };

    let location = select_text(link, "span.eventFacility");
    let attendees = select_text(link, "span.eventMember")
        .map(|text| {
            text.split(['、', ','])
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let source_event_id = anchor.value().attr("href").and_then(extract_event_id);

    let id = ScheduleRecord::derive_id(
        source_event_id.as_deref(),
        date,
        start,
        end,
        &title,
        location.as_deref(),
    );

    Some(ScheduleRecord {
        id,
        date,
        start,
        end,
        title,
        location,
        attendees,
        source_page: ctx.source_page.clone(),
    })
}

/// Parses the `span.eventDateTime` range
///
/// Absent or empty means an all-day entry; `HH:MM-` means open-ended.
/// Non-empty text that fails to parse is an error (record discarded).
fn parse_time_range(
    link: &ElementRef,
) -> Result<(Option<NaiveTime>, Option<NaiveTime>), ()> {
    let selector = Selector::parse("span.eventDateTime").map_err(|_| ())?;
    let text = match link.select(&selector).next() {
        Some(span) => span.text().collect::<String>(),
        None => return Ok((None, None)),
    };

    let text = text.trim();
    if text.is_empty() {
        return Ok((None, None));
    }

    let (begin_text, end_text) = match text.split_once('-') {
        Some((b, e)) => (b, Some(e)),
        None => (text, None),
    };

    let start = parse_time(begin_text)?;
    let end = match end_text {
        Some(e) if !e.trim().is_empty() => Some(parse_time(e)?.ok_or(())?),
        _ => None,
    };

    match start {
        Some(s) => Ok((Some(s), end)),
        // A bare "-HH:MM" or "-" range has no start; treat as malformed
        None if end.is_some() => Err(()),
        None => Ok((None, None)),
    }
}

/// Parses `H:MM` into a time; empty input is `Ok(None)`, garbage is `Err`
fn parse_time(text: &str) -> Result<Option<NaiveTime>, ()> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let (hours, minutes) = text.split_once(':').ok_or(())?;
    let hours: u32 = hours.trim().parse().map_err(|_| ())?;
    let minutes: u32 = minutes.trim().parse().map_err(|_| ())?;
    NaiveTime::from_hms_opt(hours, minutes, 0).map(Some).ok_or(())
}

/// Resolves a `M/D` cell label against the window
fn parse_cell_date(text: &str, window: DateWindow) -> Option<chrono::NaiveDate> {
    let (month, day) = text.trim().split_once('/')?;
    let month: u32 = month.trim().parse().ok()?;
    let day: u32 = day.trim().parse().ok()?;
    window.resolve_date(month, day)
}

/// Extracts the `sEID` query parameter from an event link href
fn extract_event_id(href: &str) -> Option<String> {
    let query = href.split_once('?').map(|(_, q)| q).unwrap_or(href);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "sEID")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn select_text(link: &ElementRef, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    link.select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Decides whether more pages exist for the window
///
/// A next-page control is decisive; without one, a page filled to the size
/// hint is assumed to continue (the view truncates rather than paginate
/// explicitly in some skins). Fewer records than the hint ends the window.
fn continuation_offset(document: &Html, ctx: &ParseContext, records_on_page: u32) -> Option<u32> {
    let has_next_control = Selector::parse("a.pagerNext")
        .map(|s| document.select(&s).next().is_some())
        .unwrap_or(false);

    if has_next_control || (ctx.page_size_hint > 0 && records_on_page >= ctx.page_size_hint) {
        Some(ctx.offset + records_on_page)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ctx(page_size_hint: u32) -> ParseContext {
        ParseContext {
            window: DateWindow { year: 2024, month: 5 },
            offset: 0,
            page_size_hint,
            source_page: "2024-05@0".to_string(),
        }
    }

    fn event_cell(date: &str, body: &str) -> String {
        format!(
            r#"<table><tr><td class="eventcell"><span class="date">{}</span>{}</td></tr></table>"#,
            date, body
        )
    }

    fn timed_event(eid: &str, range: &str, title: &str) -> String {
        format!(
            r#"<div class="eventLink"><div class="eventInner">
                 <span class="eventDateTime">{}&nbsp;</span>
                 <span class="eventDetail"><a class="event" href="ag.exe?page=ScheduleView&sEID={}" title="{}">{}</a></span>
               </div></div>"#,
            range, eid, title, title
        )
    }

    #[test]
    fn test_parse_timed_record() {
        let markup = event_cell("5/1", &timed_event("101", "09:00-10:30", "Kickoff"));
        let page = parse_schedule_page(&markup, &ctx(50));

        assert_eq!(page.freshness, Freshness::Fresh);
        assert_eq!(page.records.len(), 1);
        let record = &page.records[0];
        assert_eq!(record.id, "e101");
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(record.start, NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(record.end, NaiveTime::from_hms_opt(10, 30, 0));
        assert_eq!(record.title, "Kickoff");
        assert_eq!(record.location, None);
        assert!(record.attendees.is_empty());
    }

    #[test]
    fn test_parse_all_day_record() {
        let body = r#"<div class="eventLink"><div class="eventInner">
            <span class="eventDetail"><a class="event" href="ag.exe?sEID=7" title="創立記念日">創立記念日</a></span>
        </div></div>"#;
        let markup = event_cell("5/3", body);
        let page = parse_schedule_page(&markup, &ctx(50));

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].start, None);
        assert_eq!(page.records[0].end, None);
    }

    #[test]
    fn test_parse_open_ended_range() {
        let markup = event_cell("5/2", &timed_event("8", "13:00-", "外出"));
        let page = parse_schedule_page(&markup, &ctx(50));

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].start, NaiveTime::from_hms_opt(13, 0, 0));
        assert_eq!(page.records[0].end, None);
    }

    #[test]
    fn test_location_and_attendees_extracted() {
        let body = r#"<div class="eventLink"><div class="eventInner">
            <span class="eventDateTime">09:00-10:00</span>
            <span class="eventDetail"><a class="event" href="ag.exe?sEID=9" title="定例">定例</a></span>
            <span class="eventFacility">会議室1</span>
            <span class="eventMember">佐藤、鈴木</span>
        </div></div>"#;
        let markup = event_cell("5/7", body);
        let page = parse_schedule_page(&markup, &ctx(50));

        let record = &page.records[0];
        assert_eq!(record.location.as_deref(), Some("会議室1"));
        assert_eq!(record.attendees, vec!["佐藤", "鈴木"]);
    }

    #[test]
    fn test_missing_optional_fields_stay_empty() {
        let markup = event_cell("5/1", &timed_event("11", "08:00-09:00", "朝会"));
        let page = parse_schedule_page(&markup, &ctx(50));

        assert_eq!(page.records[0].location, None);
        assert!(page.records[0].attendees.is_empty());
        assert_eq!(page.discarded, 0);
    }

    #[test]
    fn test_record_without_event_id_gets_hash_id() {
        let body = r#"<div class="eventLink"><div class="eventInner">
            <span class="eventDateTime">10:00-11:00</span>
            <span class="eventDetail"><a class="event" href="ag.exe?page=ScheduleView" title="面談">面談</a></span>
        </div></div>"#;
        let markup = event_cell("5/9", body);
        let page = parse_schedule_page(&markup, &ctx(50));

        assert!(page.records[0].id.starts_with('h'));
    }

    #[test]
    fn test_malformed_time_discarded_with_accounting() {
        let good = timed_event("1", "09:00-10:00", "OK");
        let bad = timed_event("2", "午前中", "NG");
        let markup = event_cell("5/1", &format!("{}{}", good, bad));
        let page = parse_schedule_page(&markup, &ctx(50));

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].title, "OK");
        assert_eq!(page.discarded, 1);
    }

    #[test]
    fn test_unparsable_cell_date_discards_cell_entries() {
        let markup = event_cell("??", &timed_event("1", "09:00-10:00", "X"));
        let page = parse_schedule_page(&markup, &ctx(50));

        assert!(page.records.is_empty());
        assert_eq!(page.discarded, 1);
        // The grid itself was recognized
        assert_eq!(page.freshness, Freshness::Fresh);
    }

    #[test]
    fn test_adjacent_month_cells_kept() {
        let april = event_cell("4/29", &timed_event("3", "09:00-10:00", "昭和の日"));
        let page = parse_schedule_page(&april, &ctx(50));

        assert_eq!(page.records.len(), 1);
        assert_eq!(
            page.records[0].date,
            NaiveDate::from_ymd_opt(2024, 4, 29).unwrap()
        );
    }

    #[test]
    fn test_login_form_means_expired() {
        let markup = r#"<html><body><td class="loginmain">
            <select class="vr_loginForm" name="_ID"><option value="1">Yamada</option></select>
            <input type="password" name="Password">
        </td></body></html>"#;
        let page = parse_schedule_page(markup, &ctx(50));

        assert_eq!(page.freshness, Freshness::Expired);
        assert!(page.records.is_empty());
        assert!(login_form_present(markup));
    }

    #[test]
    fn test_unrecognized_page_without_marker_is_possibly_expired() {
        let page = parse_schedule_page("<html><body><p>メンテナンス中</p></body></html>", &ctx(50));
        assert_eq!(page.freshness, Freshness::PossiblyExpired);
        assert_eq!(page.continuation, None);
    }

    #[test]
    fn test_next_control_yields_continuation() {
        let cell = event_cell("5/1", &timed_event("1", "09:00-10:00", "A"));
        let markup = format!(r#"{}<a class="pagerNext" href="ag.exe?SP=1">次へ</a>"#, cell);
        let page = parse_schedule_page(&markup, &ctx(50));

        assert_eq!(page.continuation, Some(1));
    }

    #[test]
    fn test_full_page_implies_continuation() {
        let events: String = (0..3)
            .map(|i| timed_event(&i.to_string(), "09:00-10:00", "X"))
            .collect();
        let markup = event_cell("5/1", &events);
        let page = parse_schedule_page(&markup, &ctx(3));

        assert_eq!(page.continuation, Some(3));
    }

    #[test]
    fn test_short_page_ends_window() {
        let markup = event_cell("5/1", &timed_event("1", "09:00-10:00", "A"));
        let page = parse_schedule_page(&markup, &ctx(50));

        assert_eq!(page.continuation, None);
    }

    #[test]
    fn test_continuation_offset_respects_cursor() {
        let events: String = (0..2)
            .map(|i| timed_event(&i.to_string(), "09:00-10:00", "X"))
            .collect();
        let markup = event_cell("5/1", &events);
        let mut context = ctx(2);
        context.offset = 4;
        let page = parse_schedule_page(&markup, &context);

        assert_eq!(page.continuation, Some(6));
    }

    #[test]
    fn test_empty_grid_day_produces_nothing() {
        let markup = event_cell("5/6", "");
        let page = parse_schedule_page(&markup, &ctx(50));

        assert!(page.records.is_empty());
        assert_eq!(page.discarded, 0);
        assert_eq!(page.freshness, Freshness::Fresh);
    }
}
