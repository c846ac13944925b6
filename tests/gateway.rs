//! Black-box gateway scenarios, mirroring the request/response sequences a
//! real client would send over the wire.

use quorumsql::cluster::StaticCluster;
use quorumsql::codec::{Message, MessageWriter, ReadOutcome};
use quorumsql::config::PoolConfig;
use quorumsql::engine::OpenFlags;
use quorumsql::gateway::request::RequestType;
use quorumsql::gateway::response::ResponseType;
use quorumsql::gateway::Gateway;
use rusqlite::types::Value;

const TAG_INTEGER: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_TEXT: u8 = 3;
const TAG_NULL: u8 = 5;

fn tag_of(value: &Value) -> u8 {
    match value {
        Value::Integer(_) => TAG_INTEGER,
        Value::Real(_) => TAG_FLOAT,
        Value::Text(_) => TAG_TEXT,
        Value::Blob(_) => 4,
        Value::Null => TAG_NULL,
    }
}

/// Encode a request's parameter list exactly as the gateway expects it: a
/// count byte, one tag byte per parameter, word-aligned, then the values.
fn write_params(w: &mut MessageWriter, params: &[Value]) {
    #[expect(clippy::cast_possible_truncation, reason = "wire protocol caps parameter count at u8::MAX")]
    w.put_uint8(params.len() as u8);
    for p in params {
        w.put_uint8(tag_of(p));
    }
    w.align();
    for p in params {
        match p {
            Value::Integer(i) => w.put_int64(*i),
            Value::Real(f) => w.put_double(*f),
            Value::Text(s) => w.put_text(s),
            Value::Blob(bytes) => w.put_uint64(bytes.len() as u64).put_raw(bytes),
            Value::Null => w.put_uint64(0),
        };
    }
}

fn gateway_with_servers(servers: Vec<String>) -> Gateway {
    let gateway = Gateway::new(
        &PoolConfig::new(2),
        Box::new(StaticCluster::new(Some("127.0.0.1:666".to_owned()), servers)),
        5000,
    )
    .unwrap();
    gateway.register_vfs("volatile").unwrap();
    gateway
}

fn send(gateway: &Gateway, message: Message) -> Message {
    let frame = message.encode().unwrap();
    let response_frame = gateway.handle(&frame).unwrap();
    Message::decode(&response_frame).unwrap()
}

fn open(gateway: &Gateway, name: &str, flags: OpenFlags) -> u32 {
    let mut msg = Message::new(RequestType::Open as u8);
    msg.writer().put_text(name).put_uint32(flags.bits()).put_text("volatile");
    let response = send(gateway, msg);
    assert_eq!(response.message_type, ResponseType::Db as u8);
    response.reader().get_uint32().unwrap().into_inner()
}

fn prepare(gateway: &Gateway, db_id: u32, sql: &str) -> u32 {
    let mut msg = Message::new(RequestType::Prepare as u8);
    msg.writer().put_uint32(db_id).put_text(sql);
    let response = send(gateway, msg);
    assert_eq!(response.message_type, ResponseType::Stmt as u8);
    let mut r = response.reader();
    assert_eq!(r.get_uint32().unwrap().into_inner(), db_id);
    r.get_uint32().unwrap().into_inner()
}

fn exec(gateway: &Gateway, db_id: u32, stmt_id: u32, params: &[Value]) -> (i64, u64) {
    let mut msg = Message::new(RequestType::Exec as u8);
    {
        let w = &mut msg.writer();
        w.put_uint32(db_id).put_uint32(stmt_id);
        write_params(w, params);
    }
    let response = send(gateway, msg);
    assert_eq!(response.message_type, ResponseType::Result as u8);
    let mut r = response.reader();
    let last_insert_id = r.get_int64().unwrap().into_inner();
    let rows_affected = r.get_uint64().unwrap().into_inner();
    (last_insert_id, rows_affected)
}

#[test]
fn s1_helo_reports_leader() {
    let gateway = gateway_with_servers(vec!["1.2.3.4:666".to_owned(), "5.6.7.8:666".to_owned()]);
    let mut msg = Message::new(RequestType::Helo as u8);
    msg.writer().put_uint64(123);
    let response = send(&gateway, msg);
    assert_eq!(response.message_type, ResponseType::Welcome as u8);
    let leader = response.reader().get_text().unwrap().into_inner();
    assert_eq!(leader, "127.0.0.1:666");
}

#[test]
fn s2_heartbeat_lists_servers_null_terminated() {
    let gateway = gateway_with_servers(vec!["1.2.3.4:666".to_owned(), "5.6.7.8:666".to_owned()]);
    let mut msg = Message::new(RequestType::Heartbeat as u8);
    msg.writer().put_uint64(12345);
    let response = send(&gateway, msg);
    assert_eq!(response.message_type, ResponseType::Servers as u8);
    let mut r = response.reader();
    assert_eq!(r.get_text().unwrap(), ReadOutcome::More("1.2.3.4:666".to_owned()));
    assert_eq!(r.get_text().unwrap(), ReadOutcome::More("5.6.7.8:666".to_owned()));
    assert_eq!(r.get_text().unwrap(), ReadOutcome::Last(String::new()));
}

#[test]
fn s3_open_prepare_exec() {
    let gateway = gateway_with_servers(vec![]);
    let db_id = open(&gateway, "test.db", OpenFlags::READWRITE | OpenFlags::CREATE);
    assert_eq!(db_id, 0);

    let stmt_id = prepare(&gateway, db_id, "CREATE TABLE foo (n INT)");
    assert_eq!(stmt_id, 0);
    let (last_insert_id, rows_affected) = exec(&gateway, db_id, stmt_id, &[]);
    assert_eq!((last_insert_id, rows_affected), (0, 0));

    let stmt_id = prepare(&gateway, db_id, "INSERT INTO foo(n) VALUES(1)");
    assert_eq!(stmt_id, 1);
    let (last_insert_id, rows_affected) = exec(&gateway, db_id, stmt_id, &[]);
    assert_eq!((last_insert_id, rows_affected), (1, 1));
}

#[test]
fn exec_with_no_params_block_at_all_is_accepted() {
    let gateway = gateway_with_servers(vec![]);
    let db_id = open(&gateway, "test.db", OpenFlags::READWRITE | OpenFlags::CREATE);
    let stmt_id = prepare(&gateway, db_id, "CREATE TABLE foo (n INT)");

    // A body that ends right after stmt_id, with no count byte, matching
    // what a real client may send for a params-free EXEC.
    let mut exec_msg = Message::new(RequestType::Exec as u8);
    exec_msg.writer().put_uint32(db_id).put_uint32(stmt_id);
    let response = send(&gateway, exec_msg);
    assert_eq!(response.message_type, ResponseType::Result as u8);
}

#[test]
fn exec_against_two_open_databases_runs_without_an_ordering_error() {
    let gateway = gateway_with_servers(vec![]);
    let first = open(&gateway, "first.db", OpenFlags::READWRITE | OpenFlags::CREATE);
    exec(&gateway, first, prepare(&gateway, first, "CREATE TABLE foo (n INT)"), &[]);

    let second = open(&gateway, "second.db", OpenFlags::READWRITE | OpenFlags::CREATE);
    exec(&gateway, second, prepare(&gateway, second, "CREATE TABLE bar (n INT)"), &[]);

    exec(&gateway, first, prepare(&gateway, first, "INSERT INTO foo(n) VALUES(1)"), &[]);
}

#[test]
fn s4_open_with_bad_flags_reports_misuse() {
    let gateway = gateway_with_servers(vec![]);
    let mut msg = Message::new(RequestType::Open as u8);
    msg.writer()
        .put_text("test.db")
        .put_uint32(OpenFlags::CREATE.bits())
        .put_text("volatile");
    let response = send(&gateway, msg);
    assert_eq!(response.message_type, ResponseType::DbError as u8);
    let mut r = response.reader();
    let code = r.get_uint32().unwrap().into_inner();
    let extended_code = r.get_uint32().unwrap().into_inner();
    assert_eq!((code, extended_code), (21, 21));
    let description = r.get_text().unwrap().into_inner();
    assert_eq!(description, "bad parameter or other API misuse");
}

#[test]
fn s5_single_column_query_body_is_exactly_16_bytes() {
    let gateway = gateway_with_servers(vec![]);
    let db_id = open(&gateway, "test.db", OpenFlags::READWRITE | OpenFlags::CREATE);
    let stmt_id = prepare(&gateway, db_id, "CREATE TABLE foo (n INT)");
    exec(&gateway, db_id, stmt_id, &[]);
    let stmt_id = prepare(&gateway, db_id, "INSERT INTO foo(n) VALUES(-12)");
    exec(&gateway, db_id, stmt_id, &[]);

    let stmt_id = prepare(&gateway, db_id, "SELECT n FROM foo");
    let mut query = Message::new(RequestType::Query as u8);
    {
        let w = &mut query.writer();
        w.put_uint32(db_id).put_uint32(stmt_id);
        write_params(w, &[]);
    }
    let response = send(&gateway, query);
    assert_eq!(response.message_type, ResponseType::Rows as u8);
    assert_eq!(response.body.len(), 16);

    let mut r = response.reader();
    let header = r.get_uint8().unwrap().into_inner();
    assert_eq!(header & 0x0f, TAG_INTEGER);
    r.align().unwrap();
    let outcome = r.get_int64().unwrap();
    assert_eq!(outcome, ReadOutcome::Last(-12));
}

#[test]
fn s6_multi_row_multi_column_query_body_is_exactly_64_bytes() {
    let gateway = gateway_with_servers(vec![]);
    let db_id = open(&gateway, "test.db", OpenFlags::READWRITE | OpenFlags::CREATE);
    let stmt_id = prepare(&gateway, db_id, "CREATE TABLE foo (n INT, t TEXT, f FLOAT)");
    exec(&gateway, db_id, stmt_id, &[]);

    let stmt_id = prepare(&gateway, db_id, "INSERT INTO foo(n,t,f) VALUES(?,?,?)");
    exec(&gateway, db_id, stmt_id, &[Value::Integer(8), Value::Text("hello".into()), Value::Null]);
    exec(
        &gateway,
        db_id,
        stmt_id,
        &[Value::Integer(-1), Value::Text("world".into()), Value::Real(3.1415)],
    );

    let stmt_id = prepare(&gateway, db_id, "SELECT n,t,f FROM foo");
    let mut query = Message::new(RequestType::Query as u8);
    {
        let w = &mut query.writer();
        w.put_uint32(db_id).put_uint32(stmt_id);
        write_params(w, &[]);
    }
    let response = send(&gateway, query);
    assert_eq!(response.message_type, ResponseType::Rows as u8);
    assert_eq!(response.body.len(), 64);
}

#[test]
fn s7_invalid_ids_report_the_same_message_as_the_original_gateway() {
    let gateway = gateway_with_servers(vec![]);

    let mut prepare_msg = Message::new(RequestType::Prepare as u8);
    prepare_msg.writer().put_uint32(123).put_text("CREATE TABLE foo (n INT)");
    let response = send(&gateway, prepare_msg);
    assert_eq!(response.message_type, ResponseType::Failure as u8);
    assert_eq!(
        response.reader().get_text().unwrap().into_inner(),
        "failed to handle prepare: no db with id 123"
    );

    let db_id = open(&gateway, "test.db", OpenFlags::READWRITE | OpenFlags::CREATE);
    let mut exec_msg = Message::new(RequestType::Exec as u8);
    {
        let w = &mut exec_msg.writer();
        w.put_uint32(db_id).put_uint32(666);
        write_params(w, &[]);
    }
    let response = send(&gateway, exec_msg);
    assert_eq!(response.message_type, ResponseType::Failure as u8);
    assert_eq!(
        response.reader().get_text().unwrap().into_inner(),
        "failed to handle exec: no stmt with id 666"
    );
}

#[test]
fn finalize_retires_a_statement_id() {
    let gateway = gateway_with_servers(vec![]);
    let db_id = open(&gateway, "test.db", OpenFlags::READWRITE | OpenFlags::CREATE);
    let stmt_id = prepare(&gateway, db_id, "CREATE TABLE foo (n INT)");

    let mut finalize = Message::new(RequestType::Finalize as u8);
    finalize.writer().put_uint32(db_id).put_uint32(stmt_id);
    let response = send(&gateway, finalize);
    assert_eq!(response.message_type, ResponseType::Empty as u8);

    let mut exec_msg = Message::new(RequestType::Exec as u8);
    {
        let w = &mut exec_msg.writer();
        w.put_uint32(db_id).put_uint32(stmt_id);
        write_params(w, &[]);
    }
    let response = send(&gateway, exec_msg);
    assert_eq!(response.message_type, ResponseType::Failure as u8);
}
