mod realtime;
