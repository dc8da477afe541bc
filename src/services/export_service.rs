use crate::error::Result;
use crate::models::exam::Exam;
use crate::models::submission::SubmitTrigger;
use crate::services::rank_service::RankedSubmission;
use rust_xlsxwriter::*;

pub struct ExportService;

impl ExportService {
    /// Styled XLSX rank list for a single exam.
    pub fn rank_list_xlsx(exam: &Exam, ranked: &[RankedSubmission]) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Rank list")?;

        let primary_color = Color::RGB(0x1E293B);
        let header_bg = Color::RGB(0x0F172A);
        let alt_row = Color::RGB(0xF8FAFC);
        let border_color = Color::RGB(0xE2E8F0);
        let pass_color = Color::RGB(0x10B981);
        let mid_color = Color::RGB(0xF59E0B);
        let fail_color = Color::RGB(0xEF4444);

        let columns = [
            ("Rank", 8.0),
            ("Student ID", 40.0),
            ("Score", 10.0),
            ("Total", 10.0),
            ("Percent", 12.0),
            ("Submitted by", 14.0),
            ("Submitted at (UTC)", 22.0),
        ];
        for (i, (_, width)) in columns.iter().enumerate() {
            worksheet.set_column_width(i as u16, *width)?;
        }
        let last_col = (columns.len() - 1) as u16;

        let title_format = Format::new()
            .set_font_size(16)
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);
        worksheet.set_row_height(0, 36)?;
        worksheet.merge_range(0, 0, 0, last_col, &exam.title, &title_format)?;

        let subtitle_format = Format::new()
            .set_font_size(10)
            .set_italic()
            .set_font_color(Color::RGB(0x94A3B8))
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross);
        let subtitle = format!(
            "Window: {} - {} | Duration: {} min | Submissions: {}",
            exam.start_time.format("%d.%m.%Y %H:%M"),
            exam.end_time.format("%d.%m.%Y %H:%M"),
            exam.duration_minutes,
            ranked.len()
        );
        worksheet.set_row_height(1, 22)?;
        worksheet.merge_range(1, 0, 1, last_col, &subtitle, &subtitle_format)?;

        let header_format = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(Color::White)
            .set_background_color(header_bg)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);
        let header_row = 2;
        worksheet.set_row_height(header_row, 26)?;
        for (i, (name, _)) in columns.iter().enumerate() {
            worksheet.write_string_with_format(header_row, i as u16, *name, &header_format)?;
        }

        let data_start_row = header_row + 1;
        for (idx, entry) in ranked.iter().enumerate() {
            let row = data_start_row + idx as u32;
            let bg = if idx % 2 == 0 { alt_row } else { Color::White };
            let base_fmt = Format::new()
                .set_font_size(10)
                .set_background_color(bg)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            let center_fmt = base_fmt.clone().set_align(FormatAlign::Center);

            let pct_color = if entry.percentage >= 70.0 {
                pass_color
            } else if entry.percentage >= 40.0 {
                mid_color
            } else {
                fail_color
            };
            let pct_fmt = center_fmt
                .clone()
                .set_bold()
                .set_font_color(pct_color)
                .set_num_format("0.0");

            worksheet.write_number_with_format(row, 0, entry.rank as f64, &center_fmt.clone().set_bold())?;
            worksheet.write_string_with_format(row, 1, entry.student_id.to_string(), &base_fmt)?;
            worksheet.write_number_with_format(row, 2, f64::from(entry.score), &center_fmt)?;
            worksheet.write_number_with_format(row, 3, f64::from(entry.total_marks), &center_fmt)?;
            worksheet.write_number_with_format(row, 4, entry.percentage, &pct_fmt)?;
            let trigger = match entry.trigger {
                SubmitTrigger::Manual => "Student",
                SubmitTrigger::Timeout => "Timer",
            };
            worksheet.write_string_with_format(row, 5, trigger, &center_fmt)?;
            worksheet.write_string_with_format(
                row,
                6,
                entry.submitted_at.format("%d.%m.%Y %H:%M:%S").to_string(),
                &center_fmt,
            )?;
        }

        let summary_row = data_start_row + ranked.len() as u32 + 1;
        let summary_fmt = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(primary_color)
            .set_background_color(Color::RGB(0xE0E7FF))
            .set_align(FormatAlign::Center)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);
        let average = if ranked.is_empty() {
            0.0
        } else {
            ranked.iter().map(|r| r.percentage).sum::<f64>() / ranked.len() as f64
        };
        let timed_out = ranked
            .iter()
            .filter(|r| r.trigger == SubmitTrigger::Timeout)
            .count();
        let summary = format!(
            "Average: {:.1}% | Auto-submitted: {} | Total marks: {}",
            average,
            timed_out,
            exam.total_marks()
        );
        worksheet.set_row_height(summary_row, 24)?;
        worksheet.merge_range(summary_row, 0, summary_row, last_col, &summary, &summary_fmt)?;

        worksheet.set_freeze_panes(data_start_row, 0)?;
        if !ranked.is_empty() {
            worksheet.autofilter(header_row, 0, data_start_row + ranked.len() as u32 - 1, last_col)?;
        }

        let buffer = workbook.save_to_buffer()?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam::ExamSettings;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn produces_a_zip_container() {
        let now = Utc::now();
        let exam = Exam {
            id: Uuid::new_v4(),
            class_id: Uuid::new_v4(),
            title: "Final".into(),
            description: None,
            start_time: now,
            end_time: now + chrono::Duration::hours(1),
            duration_minutes: 40,
            questions: Vec::new(),
            settings: ExamSettings::default(),
            is_published: true,
            created_by: Uuid::new_v4(),
            created_at: now,
        };
        let ranked = vec![RankedSubmission {
            rank: 1,
            submission_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            score: 7,
            total_marks: 10,
            percentage: 70.0,
            trigger: SubmitTrigger::Timeout,
            submitted_at: now,
        }];

        for rows in [&ranked[..], &ranked[..0]] {
            let bytes = ExportService::rank_list_xlsx(&exam, rows).unwrap();
            assert_eq!(&bytes[..2], b"PK");
        }
    }
}
