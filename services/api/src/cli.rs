use crate::console::{self, ConsoleCommand, OutputFormat};
use crate::demo::{run_demo, DemoArgs};
use crate::infra::{parse_period, BackendAuth};
use crate::server;
use clap::{Args, Parser, Subcommand};
use matricula::error::AppError;
use matricula::workflows::enrollment::{
    AcademicPeriod, EnrollmentQuery, NewEnrollment, SectionId, SlotFilter, StudentId,
    DEFAULT_PAGE_SIZE,
};

#[derive(Parser, Debug)]
#[command(
    name = "matricula",
    about = "Run the enrollment console or work with enrollment slots from the command line",
    version
)]
struct Cli {
    #[command(flatten)]
    auth: AuthArgs,
    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug, Default)]
struct AuthArgs {
    /// Bearer token for the backend (overrides APP_BACKEND_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,
    /// Log in with this username before running the command
    #[arg(long, global = true, requires = "password")]
    username: Option<String>,
    /// Password for --username
    #[arg(long, global = true, requires = "username")]
    password: Option<String>,
}

impl From<AuthArgs> for BackendAuth {
    fn from(args: AuthArgs) -> Self {
        BackendAuth {
            token: args.token,
            username: args.username,
            password: args.password,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// List grade/section offerings with their remaining seats
    Slots(SlotArgs),
    /// List the grade, section and academic-year filter choices
    Filters,
    /// List students without an enrollment in the current period
    Students,
    /// List the sections a student may be enrolled in
    Candidates {
        #[arg(long)]
        student: u64,
    },
    /// Enroll a student into a section
    Enroll {
        #[arg(long)]
        student: u64,
        #[arg(long)]
        section: u64,
    },
    /// Search the enrollments of an academic period
    Enrollments(EnrollmentArgs),
    /// Walk the capacity scenarios against an in-process school
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug, Default)]
struct SlotArgs {
    /// Grade id (0 or omitted lists every grade)
    #[arg(long)]
    grade: Option<u64>,
    /// Section (paralelo) id
    #[arg(long)]
    section: Option<u64>,
    /// Academic year id
    #[arg(long)]
    year: Option<u64>,
}

#[derive(Args, Debug)]
struct EnrollmentArgs {
    /// Academic period such as 2025-2026 (defaults to the current one)
    #[arg(long, value_parser = parse_period)]
    period: Option<AcademicPeriod>,
    /// Case-insensitive text to look for in student, grade, section or status
    #[arg(long)]
    search: Option<String>,
    /// Zero-based page number
    #[arg(long, default_value_t = 0)]
    page: usize,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,
}

impl Command {
    fn into_console(self) -> Option<ConsoleCommand> {
        let command = match self {
            Command::Slots(args) => ConsoleCommand::Slots(SlotFilter {
                grade_id: args.grade,
                section_id: args.section,
                academic_year_id: args.year,
            }),
            Command::Filters => ConsoleCommand::Filters,
            Command::Students => ConsoleCommand::Students,
            Command::Candidates { student } => ConsoleCommand::Candidates(StudentId(student)),
            Command::Enroll { student, section } => ConsoleCommand::Enroll(NewEnrollment {
                student_id: StudentId(student),
                section_id: SectionId(section),
            }),
            Command::Enrollments(args) => ConsoleCommand::Enrollments(EnrollmentQuery {
                period: args.period,
                search: args.search,
                page: args.page,
                page_size: args.page_size,
            }),
            Command::Serve(_) | Command::Demo(_) => return None,
        };
        Some(command)
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let auth = BackendAuth::from(cli.auth);
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args, auth).await,
        Command::Demo(args) => run_demo(args).await,
        other => match other.into_console() {
            Some(command) => console::run(command, auth, format).await,
            None => Ok(()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("matricula").chain(args.iter().copied()))
            .expect("valid arguments")
    }

    #[test]
    fn serve_is_the_default_command() {
        assert!(parse(&[]).command.is_none());
    }

    #[test]
    fn enroll_maps_to_a_commit_request() {
        let cli = parse(&["enroll", "--student", "7", "--section", "12", "--token", "t"]);

        assert_eq!(cli.auth.token.as_deref(), Some("t"));
        match cli.command.and_then(Command::into_console) {
            Some(ConsoleCommand::Enroll(request)) => {
                assert_eq!(request.student_id, StudentId(7));
                assert_eq!(request.section_id, SectionId(12));
            }
            other => panic!("expected enroll, got {other:?}"),
        }
    }

    #[test]
    fn enrollments_default_to_the_first_page() {
        let cli = parse(&["enrollments", "--period", "2024-2025", "--json"]);

        assert!(cli.json);
        match cli.command.and_then(Command::into_console) {
            Some(ConsoleCommand::Enrollments(query)) => {
                assert_eq!(query.period, Some(AcademicPeriod::from("2024-2025")));
                assert_eq!(query.page, 0);
                assert_eq!(query.page_size, DEFAULT_PAGE_SIZE);
            }
            other => panic!("expected enrollments, got {other:?}"),
        }
    }

    #[test]
    fn username_requires_password() {
        let result = Cli::try_parse_from(["matricula", "students", "--username", "secretaria"]);
        assert!(result.is_err());
    }
}
